// src/lib.rs

//! Trendline: hot-list snapshot aggregation and channel digest library

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

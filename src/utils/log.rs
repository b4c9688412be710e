// src/utils/log.rs

//! Pipeline progress logging with server-style formatting.
//!
//! Thin helpers over the `log` facade so progress output keeps a consistent
//! shape regardless of which logger the binary installs.

/// Log a step in a process.
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a header.
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a sub-item (indented).
pub fn sub_item(message: &str) {
    log::info!("    {}", message);
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}

/// Log a completed phase.
pub fn success(message: &str) {
    log::info!("[OK] {}", message);
}

/// Log a non-fatal problem.
pub fn warn(message: &str) {
    log::warn!("[WARN] {}", message);
}

//! Composite popularity weight used for ordering titles inside a group.

use crate::models::WeightConfig;

/// Ranks beyond this all receive the same minimum credit.
const RANK_FLOOR: u32 = 10;
/// Occurrence count saturates here.
const COUNT_CAP: u32 = 10;

/// Weight of a title from its observed ranks and occurrence count.
///
/// Combines three sub-scores:
/// - rank: mean of `11 - min(rank, 10)` over all ranks
/// - frequency: `min(count, 10) * 10`
/// - hotness: percentage of ranks `<= rank_threshold`
///
/// An empty rank list scores 0.
pub fn weight(ranks: &[u32], count: u32, rank_threshold: u32, coefficients: &WeightConfig) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }

    let n = ranks.len() as f64;
    let rank_score = ranks
        .iter()
        .map(|&rank| f64::from(RANK_FLOOR + 1 - rank.min(RANK_FLOOR)))
        .sum::<f64>()
        / n;

    let frequency_score = f64::from(count.min(COUNT_CAP)) * 10.0;

    let hot = ranks.iter().filter(|&&rank| rank <= rank_threshold).count() as f64;
    let hotness_score = hot / n * 100.0;

    rank_score * coefficients.rank_weight
        + frequency_score * coefficients.frequency_weight
        + hotness_score * coefficients.hotness_weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_known_value() {
        let w = WeightConfig::default();
        // rank: (6 + 8 + 9) / 3 = 7.666..; freq: 30; hot: 2/3 * 100
        let expected = (23.0 / 3.0) * 0.6 + 30.0 * 0.3 + (200.0 / 3.0) * 0.1;
        assert!(close(weight(&[5, 3, 2], 3, 3, &w), expected));
    }

    #[test]
    fn test_saturation() {
        let w = WeightConfig::default();
        assert!(close(weight(&[10], 1, 5, &w), weight(&[50], 1, 5, &w)));
        assert!(close(weight(&[1], 10, 5, &w), weight(&[1], 40, 5, &w)));
    }

    #[test]
    fn test_better_rank_scores_higher() {
        let w = WeightConfig::default();
        assert!(weight(&[1, 1], 2, 5, &w) > weight(&[8, 8], 2, 5, &w));
        // repeated low ranks count separately from one good rank
        assert!(weight(&[1, 9, 9], 3, 5, &w) < weight(&[1, 1, 1], 3, 5, &w));
    }

    #[test]
    fn test_empty_ranks() {
        assert_eq!(weight(&[], 4, 5, &WeightConfig::default()), 0.0);
    }

    #[test]
    fn test_custom_coefficients() {
        let only_hot = WeightConfig {
            rank_weight: 0.0,
            frequency_weight: 0.0,
            hotness_weight: 1.0,
        };
        assert!(close(weight(&[1, 2, 20, 30], 4, 2, &only_hot), 50.0));
    }
}

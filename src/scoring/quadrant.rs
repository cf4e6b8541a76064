use crate::models::{Quadrant, ScoringConfig};

/// Place a subject using the run's thresholds. A value equal to the threshold
/// counts as high.
pub fn classify(impact: f64, quality: Option<f64>, config: &ScoringConfig) -> Quadrant {
    let high_impact = impact >= config.impact_threshold;
    match (high_impact, quality) {
        (true, None) => Quadrant::HU,
        (false, None) => Quadrant::LU,
        (true, Some(q)) if q >= config.quality_threshold => Quadrant::HH,
        (true, Some(_)) => Quadrant::HL,
        (false, Some(q)) if q >= config.quality_threshold => Quadrant::LH,
        (false, Some(_)) => Quadrant::LL,
    }
}

/// Round to 4 decimal places so stored scores compare exactly across runs.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_points() {
        let config = ScoringConfig::default();
        assert_eq!(classify(0.8, Some(0.9), &config), Quadrant::HH);
        assert_eq!(classify(0.8, Some(0.4), &config), Quadrant::HL);
        assert_eq!(classify(0.3, None, &config), Quadrant::LU);
        assert_eq!(classify(0.3, Some(0.95), &config), Quadrant::LH);
        assert_eq!(classify(0.9, None, &config), Quadrant::HU);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let config = ScoringConfig::default();
        assert_eq!(classify(0.5, Some(0.7), &config), Quadrant::HH);
        assert_eq!(classify(0.4999, Some(0.6999), &config), Quadrant::LL);
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0 / 3.0), 0.3333);
    }
}

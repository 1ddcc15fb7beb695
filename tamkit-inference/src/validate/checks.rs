use std::fmt::{Display, Formatter};

pub const LARGE_MODEL_MB: f64 = 100.0;
pub const HEAVY_MODEL_MB: f64 = 50.0;
pub const MEDIUM_MODEL_MB: f64 = 20.0;
pub const HIGH_MEMORY_MB: f64 = 100.0;
pub const SCORED_MEMORY_MB: f64 = 50.0;

const NOT_QUANTIZED_PENALTY: i64 = 20;
const HEAVY_SIZE_PENALTY: i64 = 15;
const MEDIUM_SIZE_PENALTY: i64 = 5;
const MEMORY_PENALTY: i64 = 10;
const WARNING_PENALTY: i64 = 5;

/// Everything the compatibility score depends on.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScoreFacts {
    pub quantized: bool,
    pub size_mb: f64,
    pub memory_mb: f64,
    pub warnings: usize,
}

/// Additive deductions from 100, floored at 0.
pub fn compatibility_score(facts: &ScoreFacts) -> u32 {
    let mut score = 100i64;

    if !facts.quantized {
        score -= NOT_QUANTIZED_PENALTY;
    }
    if facts.size_mb > HEAVY_MODEL_MB {
        score -= HEAVY_SIZE_PENALTY;
    } else if facts.size_mb > MEDIUM_MODEL_MB {
        score -= MEDIUM_SIZE_PENALTY;
    }
    if facts.memory_mb > SCORED_MEMORY_MB {
        score -= MEMORY_PENALTY;
    }
    score -= facts.warnings as i64 * WARNING_PENALTY;

    score.max(0) as u32
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Rating {
    pub fn from_score(score: u32) -> Self {
        match score {
            90.. => Rating::Excellent,
            70..=89 => Rating::Good,
            50..=69 => Rating::Fair,
            _ => Rating::Poor,
        }
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rating::Excellent => write!(f, "Excellent for deployment"),
            Rating::Good => write!(f, "Good for deployment with minor optimizations"),
            Rating::Fair => write!(f, "Fair - optimization recommended"),
            Rating::Poor => write!(f, "Poor - significant optimization needed"),
        }
    }
}

/// Rounds to two decimals the way sizes are reported.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_model_scores_full_marks() {
        let facts = ScoreFacts {
            quantized: true,
            size_mb: 4.0,
            memory_mb: 1.0,
            warnings: 0,
        };
        assert_eq!(compatibility_score(&facts), 100);
        assert_eq!(Rating::from_score(100), Rating::Excellent);
    }

    #[test]
    fn deductions_add_up() {
        let facts = ScoreFacts {
            quantized: false,
            size_mb: 30.0,
            memory_mb: 60.0,
            warnings: 2,
        };
        assert_eq!(compatibility_score(&facts), 100 - 20 - 5 - 10 - 10);
    }

    #[test]
    fn score_never_goes_negative() {
        let facts = ScoreFacts {
            quantized: false,
            size_mb: 500.0,
            memory_mb: 500.0,
            warnings: 40,
        };
        assert_eq!(compatibility_score(&facts), 0);
        assert_eq!(Rating::from_score(0), Rating::Poor);
    }

    #[test]
    fn score_is_monotone_in_warning_conditions() {
        let mut facts = ScoreFacts {
            quantized: true,
            size_mb: 1.0,
            memory_mb: 1.0,
            warnings: 0,
        };
        let mut previous = compatibility_score(&facts);

        let steps: [fn(&mut ScoreFacts); 6] = [
            |f| f.warnings += 1,
            |f| f.quantized = false,
            |f| f.size_mb = 25.0,
            |f| f.size_mb = 75.0,
            |f| f.memory_mb = 80.0,
            |f| f.warnings += 3,
        ];
        for step in steps {
            step(&mut facts);
            let score = compatibility_score(&facts);
            assert!(score <= previous, "{:?} raised the score", facts);
            previous = score;
        }
    }

    #[test]
    fn rating_thresholds() {
        assert_eq!(Rating::from_score(90), Rating::Excellent);
        assert_eq!(Rating::from_score(89), Rating::Good);
        assert_eq!(Rating::from_score(70), Rating::Good);
        assert_eq!(Rating::from_score(69), Rating::Fair);
        assert_eq!(Rating::from_score(50), Rating::Fair);
        assert_eq!(Rating::from_score(49), Rating::Poor);
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(12.3456), 12.35);
    }
}

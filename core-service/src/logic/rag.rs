//! RAG (red / amber / green) classification and weighted averaging.
//!
//! Normal thresholds (`slo > slo_min`) mean higher is better. When
//! `slo <= slo_min` the metric is a lower-is-better one (defect counts and
//! the like) and the bands are mirrored:
//!
//! | thresholds        | green           | amber                    | red             |
//! |-------------------|-----------------|--------------------------|-----------------|
//! | `slo > slo_min`   | `score >= slo`  | `slo_min <= score < slo` | `score < slo_min` |
//! | `slo <= slo_min`  | `score < slo`   | `slo <= score < slo_min` | `score >= slo_min` |

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rag {
    Red,
    Amber,
    Green,
}

impl Rag {
    pub fn as_str(self) -> &'static str {
        match self {
            Rag::Red => "red",
            Rag::Amber => "amber",
            Rag::Green => "green",
        }
    }
}

impl fmt::Display for Rag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(score: f64, slo: f64, slo_min: f64) -> Rag {
    if slo > slo_min {
        if score < slo_min {
            Rag::Red
        } else if score < slo {
            Rag::Amber
        } else {
            Rag::Green
        }
    } else if score < slo {
        Rag::Green
    } else if score < slo_min {
        Rag::Amber
    } else {
        Rag::Red
    }
}

/// Classification outcome including the "insufficient data" case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Red,
    Amber,
    Green,
    NoData,
}

impl From<Rag> for Status {
    fn from(rag: Rag) -> Self {
        match rag {
            Rag::Red => Status::Red,
            Rag::Amber => Status::Amber,
            Rag::Green => Status::Green,
        }
    }
}

impl Status {
    /// `NoData` when there is no score to classify
    pub fn of(score: Option<f64>, slo: f64, slo_min: f64) -> Self {
        match score {
            Some(s) if s.is_finite() => classify(s, slo, slo_min).into(),
            _ => Status::NoData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient data: no weighted values to average")]
pub struct NoData;

/// Weighted mean of `(value, weight)` pairs.
///
/// Pairs with a zero, negative or non-finite weight, or a non-finite value,
/// contribute to neither numerator nor denominator.
pub fn weighted_average<I>(pairs: I) -> Result<f64, NoData>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (sum, weights) = pairs
        .into_iter()
        .filter(|(value, weight)| value.is_finite() && weight.is_finite() && *weight > 0.0)
        .fold((0.0, 0.0), |(sum, weights), (value, weight)| {
            (sum + value * weight, weights + weight)
        });

    if weights > 0.0 {
        Ok(sum / weights)
    } else {
        Err(NoData)
    }
}

/// Arithmetic mean; `None` for an empty input
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_thresholds() {
        assert_eq!(classify(0.80, 0.95, 0.90), Rag::Red);
        assert_eq!(classify(0.92, 0.95, 0.90), Rag::Amber);
        assert_eq!(classify(0.97, 0.95, 0.90), Rag::Green);
        // band edges
        assert_eq!(classify(0.90, 0.95, 0.90), Rag::Amber);
        assert_eq!(classify(0.95, 0.95, 0.90), Rag::Green);
    }

    #[test]
    fn test_inverted_thresholds() {
        assert_eq!(classify(0.80, 0.10, 0.50), Rag::Red);
        assert_eq!(classify(0.45, 0.10, 0.50), Rag::Amber);
        assert_eq!(classify(0.05, 0.10, 0.50), Rag::Green);
        assert_eq!(classify(0.50, 0.10, 0.50), Rag::Red);
        assert_eq!(classify(0.10, 0.10, 0.50), Rag::Amber);
    }

    #[test]
    fn test_equal_thresholds_have_no_amber_band() {
        assert_eq!(classify(0.49, 0.5, 0.5), Rag::Green);
        assert_eq!(classify(0.5, 0.5, 0.5), Rag::Red);
    }

    #[test]
    fn test_status_without_score() {
        assert_eq!(Status::of(None, 0.95, 0.9), Status::NoData);
        assert_eq!(Status::of(Some(f64::NAN), 0.95, 0.9), Status::NoData);
        assert_eq!(Status::of(Some(1.0), 0.95, 0.9), Status::Green);
    }

    #[test]
    fn test_weighted_average_skips_zero_weights() {
        let avg = weighted_average([(1.0, 0.5), (0.0, 0.0), (0.5, 0.5)]).unwrap();
        assert!((avg - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_average_no_data() {
        assert_eq!(weighted_average([(1.0, 0.0), (0.4, f64::NAN)]), Err(NoData));
        assert_eq!(weighted_average(std::iter::empty()), Err(NoData));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Status::NoData).unwrap(), "\"no_data\"");
        assert_eq!(serde_json::to_string(&Rag::Amber).unwrap(), "\"amber\"");
    }
}

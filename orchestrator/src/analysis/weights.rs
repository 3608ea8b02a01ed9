//! Slider values and their normalization into a weight vector

use super::ValidationError;
use serde::{Deserialize, Serialize};
use svc_siting_client_rest::types::Weights;

/// Lowest slider position
pub const SLIDER_MIN: f64 = 0.0;

/// Highest slider position
pub const SLIDER_MAX: f64 = 100.0;

/// Initial slider position
pub const SLIDER_DEFAULT: f64 = 50.0;

/// Raw importance of each criterion as set by the user, 0 to 100
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderValues {
    pub power: f64,
    pub market: f64,
    pub logistics: f64,
}

impl Default for SliderValues {
    fn default() -> Self {
        Self {
            power: SLIDER_DEFAULT,
            market: SLIDER_DEFAULT,
            logistics: SLIDER_DEFAULT,
        }
    }
}

impl SliderValues {
    /// Build slider values, clamping each into the slider range
    pub fn new(power: f64, market: f64, logistics: f64) -> Self {
        let clamp = |v: f64| {
            if v.is_nan() {
                SLIDER_MIN
            } else {
                v.clamp(SLIDER_MIN, SLIDER_MAX)
            }
        };

        Self {
            power: clamp(power),
            market: clamp(market),
            logistics: clamp(logistics),
        }
    }

    /// The weight vector for these slider values
    pub fn normalized(&self) -> Result<Weights, ValidationError> {
        normalize(self.power, self.market, self.logistics)
    }
}

/// Convert raw weights into components that sum to 1.
///
/// Each component is `raw / sum`. Negative or non-finite inputs and an
/// all-zero triple are rejected with [`ValidationError::InvalidWeights`].
pub fn normalize(power: f64, market: f64, logistics: f64) -> Result<Weights, ValidationError> {
    let raw = [power, market, logistics];
    if raw.iter().any(|v| !v.is_finite() || *v < 0.0) {
        analysis_warn!(
            "(normalize) rejecting weights ({}, {}, {}).",
            power,
            market,
            logistics
        );
        return Err(ValidationError::InvalidWeights);
    }

    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        analysis_warn!("(normalize) all weights are zero.");
        return Err(ValidationError::InvalidWeights);
    }

    Ok(Weights {
        power: power / sum,
        market: market / sum,
        logistics: logistics / sum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn sum(w: &Weights) -> f64 {
        w.power + w.market + w.logistics
    }

    #[test]
    fn test_default_sliders_split_evenly() {
        let weights = SliderValues::default().normalized().unwrap();
        assert!((weights.power - 1.0 / 3.0).abs() < 1e-12);
        assert!((weights.market - 1.0 / 3.0).abs() < 1e-12);
        assert!((weights.logistics - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_criterion() {
        let weights = normalize(100.0, 0.0, 0.0).unwrap();
        assert_eq!(weights.power, 1.0);
        assert_eq!(weights.market, 0.0);
        assert_eq!(weights.logistics, 0.0);
    }

    #[test]
    fn test_random_triples_sum_to_one() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let (a, b, c): (f64, f64, f64) = (
                rng.gen_range(0.0..=100.0),
                rng.gen_range(0.0..=100.0),
                rng.gen_range(0.0..=100.0),
            );
            if a + b + c <= 0.0 {
                continue;
            }

            let weights = normalize(a, b, c).unwrap();
            assert!((sum(&weights) - 1.0).abs() < 1e-9, "({a}, {b}, {c})");
            assert!(weights.power >= 0.0);
            assert!(weights.market >= 0.0);
            assert!(weights.logistics >= 0.0);
        }
    }

    #[test]
    fn test_tiny_weights_still_normalize() {
        let weights = normalize(1e-300, 0.0, 1e-300).unwrap();
        assert!((sum(&weights) - 1.0).abs() < 1e-9);
        assert_eq!(weights.power, 0.5);
    }

    #[test]
    fn test_degenerate_weights_rejected() {
        assert_eq!(normalize(0.0, 0.0, 0.0), Err(ValidationError::InvalidWeights));
        assert_eq!(normalize(-1.0, 2.0, 2.0), Err(ValidationError::InvalidWeights));
        assert_eq!(normalize(f64::NAN, 1.0, 1.0), Err(ValidationError::InvalidWeights));
        assert_eq!(
            normalize(f64::INFINITY, 1.0, 1.0),
            Err(ValidationError::InvalidWeights)
        );
    }

    #[test]
    fn test_slider_values_clamped() {
        let sliders = SliderValues::new(150.0, -5.0, f64::NAN);
        assert_eq!(sliders.power, SLIDER_MAX);
        assert_eq!(sliders.market, SLIDER_MIN);
        assert_eq!(sliders.logistics, SLIDER_MIN);
    }
}

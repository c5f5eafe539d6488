//! Radiance calibration.
//!
//! Reflective bands (1-6) convert radiance to reflectance factor using
//! `kappa0`; emissive bands (7-16) use the inverse Planck function with the
//! per-band coefficients stored in each file.

use crate::error::{NetCdfError, NetCdfResult};
use scene_common::CalibrationKind;

/// Inverse Planck coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanckCoefficients {
    pub fk1: f32,
    pub fk2: f32,
    pub bc1: f32,
    pub bc2: f32,
}

/// Calibration coefficients read from one file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationCoefficients {
    pub band: u8,
    pub kappa0: Option<f32>,
    pub planck: Option<PlanckCoefficients>,
}

/// Convert radiances in place to the requested calibration.
///
/// Reflectance is returned in percent; brightness temperature in Kelvin.
/// Non-positive radiances have no brightness temperature and become NaN.
pub fn calibrate(
    radiance: &mut [f32],
    coefficients: &CalibrationCoefficients,
    kind: CalibrationKind,
) -> NetCdfResult<()> {
    match kind {
        CalibrationKind::Reflectance => {
            let kappa0 = coefficients
                .kappa0
                .filter(|k| k.is_finite())
                .ok_or(NetCdfError::MissingCalibration {
                    band: coefficients.band,
                    coefficient: "kappa0",
                })?;
            let factor = kappa0 * 100.0;
            for value in radiance.iter_mut() {
                *value *= factor;
            }
        }
        CalibrationKind::BrightnessTemperature => {
            let p = coefficients
                .planck
                .ok_or(NetCdfError::MissingCalibration {
                    band: coefficients.band,
                    coefficient: "planck",
                })?;
            for value in radiance.iter_mut() {
                *value = if *value > 0.0 {
                    (p.fk2 / (p.fk1 / *value + 1.0).ln() - p.bc1) / p.bc2
                } else {
                    f32::NAN
                };
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Band 13 coefficients from a GOES-16 CONUS file.
    fn c13() -> CalibrationCoefficients {
        CalibrationCoefficients {
            band: 13,
            kappa0: None,
            planck: Some(PlanckCoefficients {
                fk1: 10803.3,
                fk2: 1392.74,
                bc1: 0.07550,
                bc2: 0.99975,
            }),
        }
    }

    #[test]
    fn test_reflectance() {
        let coeffs = CalibrationCoefficients {
            band: 2,
            kappa0: Some(0.0019),
            planck: None,
        };
        let mut values = vec![0.0, 100.0, f32::NAN];
        calibrate(&mut values, &coeffs, CalibrationKind::Reflectance).unwrap();
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 19.0).abs() < 1e-4);
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_brightness_temperature() {
        let mut values = vec![100.0, 0.0, -1.0];
        calibrate(&mut values, &c13(), CalibrationKind::BrightnessTemperature).unwrap();
        // About 297 K for a warm window-channel radiance
        assert!(values[0] > 290.0 && values[0] < 305.0, "bt = {}", values[0]);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_missing_coefficient() {
        let mut values = vec![1.0];
        let err = calibrate(&mut values, &c13(), CalibrationKind::Reflectance).unwrap_err();
        assert!(matches!(
            err,
            NetCdfError::MissingCalibration { band: 13, coefficient: "kappa0" }
        ));
    }
}

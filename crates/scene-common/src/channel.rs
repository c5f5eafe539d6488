//! ABI channel table.

use serde::{Deserialize, Serialize};

/// Physical quantity a channel is calibrated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationKind {
    /// Reflectance factor in percent
    Reflectance,
    /// Brightness temperature in Kelvin
    BrightnessTemperature,
}

impl CalibrationKind {
    pub fn units(&self) -> &'static str {
        match self {
            CalibrationKind::Reflectance => "%",
            CalibrationKind::BrightnessTemperature => "K",
        }
    }

    pub fn standard_name(&self) -> &'static str {
        match self {
            CalibrationKind::Reflectance => "toa_bidirectional_reflectance",
            CalibrationKind::BrightnessTemperature => "toa_brightness_temperature",
        }
    }
}

/// Static description of one ABI band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbiChannel {
    /// Band number 1..=16
    pub band: u8,
    /// Channel name, `C01`..`C16`
    pub name: &'static str,
    /// `(min, central, max)` wavelength in micrometers
    pub wavelength: (f32, f32, f32),
    /// Nominal resolution at nadir (km)
    pub resolution_km: f32,
    pub calibration: CalibrationKind,
}

macro_rules! channel {
    ($band:expr, $name:expr, $min:expr, $c:expr, $max:expr, $res:expr, $cal:ident) => {
        AbiChannel {
            band: $band,
            name: $name,
            wavelength: ($min, $c, $max),
            resolution_km: $res,
            calibration: CalibrationKind::$cal,
        }
    };
}

/// All sixteen ABI bands in band order.
pub const ABI_CHANNELS: [AbiChannel; 16] = [
    channel!(1, "C01", 0.45, 0.47, 0.49, 1.0, Reflectance),
    channel!(2, "C02", 0.59, 0.64, 0.69, 0.5, Reflectance),
    channel!(3, "C03", 0.8455, 0.865, 0.8845, 1.0, Reflectance),
    channel!(4, "C04", 1.3705, 1.378, 1.3855, 2.0, Reflectance),
    channel!(5, "C05", 1.58, 1.61, 1.64, 1.0, Reflectance),
    channel!(6, "C06", 2.225, 2.25, 2.275, 2.0, Reflectance),
    channel!(7, "C07", 3.80, 3.89, 3.99, 2.0, BrightnessTemperature),
    channel!(8, "C08", 5.77, 6.17, 6.6, 2.0, BrightnessTemperature),
    channel!(9, "C09", 6.75, 6.93, 7.15, 2.0, BrightnessTemperature),
    channel!(10, "C10", 7.24, 7.34, 7.44, 2.0, BrightnessTemperature),
    channel!(11, "C11", 8.3, 8.5, 8.7, 2.0, BrightnessTemperature),
    channel!(12, "C12", 9.42, 9.61, 9.8, 2.0, BrightnessTemperature),
    channel!(13, "C13", 10.1, 10.35, 10.6, 2.0, BrightnessTemperature),
    channel!(14, "C14", 10.8, 11.2, 11.6, 2.0, BrightnessTemperature),
    channel!(15, "C15", 11.8, 12.3, 12.8, 2.0, BrightnessTemperature),
    channel!(16, "C16", 13.0, 13.3, 13.6, 2.0, BrightnessTemperature),
];

impl AbiChannel {
    /// Look up a band by number (1..=16).
    pub fn from_band(band: u8) -> Option<&'static AbiChannel> {
        ABI_CHANNELS.iter().find(|c| c.band == band)
    }

    /// Look up a band by name, `C07` or `c07`.
    pub fn from_name(name: &str) -> Option<&'static AbiChannel> {
        ABI_CHANNELS
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Channel whose wavelength range contains `wavelength`, preferring the
    /// closest central wavelength when ranges overlap.
    pub fn from_wavelength(wavelength: f32) -> Option<&'static AbiChannel> {
        ABI_CHANNELS
            .iter()
            .filter(|c| c.contains_wavelength(wavelength))
            .min_by(|a, b| {
                let da = (a.wavelength.1 - wavelength).abs();
                let db = (b.wavelength.1 - wavelength).abs();
                da.total_cmp(&db)
            })
    }

    pub fn contains_wavelength(&self, wavelength: f32) -> bool {
        wavelength >= self.wavelength.0 && wavelength <= self.wavelength.2
    }

    pub fn central_wavelength(&self) -> f32 {
        self.wavelength.1
    }

    pub fn is_reflective(&self) -> bool {
        self.calibration == CalibrationKind::Reflectance
    }
}

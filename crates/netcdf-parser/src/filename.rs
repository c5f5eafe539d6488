//! ABI L1b file name parsing.
//!
//! Files on the NOAA buckets are named
//! `OR_ABI-L1b-Rad{sector}-M{mode}C{band}_G{sat}_s{start}_e{end}_c{created}.nc`
//! where times are `YYYYJJJHHMMSSt` (day of year, tenths of a second).

use crate::error::{NetCdfError, NetCdfResult};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::fmt;
use std::path::Path;

/// Scan sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sector {
    FullDisk,
    Conus,
    Meso1,
    Meso2,
}

impl Sector {
    fn parse(code: &str) -> Option<Self> {
        match code {
            "F" => Some(Sector::FullDisk),
            "C" => Some(Sector::Conus),
            "M1" => Some(Sector::Meso1),
            "M2" => Some(Sector::Meso2),
            _ => None,
        }
    }

    /// Short lowercase label used in area ids.
    pub fn label(&self) -> &'static str {
        match self {
            Sector::FullDisk => "fd",
            Sector::Conus => "conus",
            Sector::Meso1 => "meso1",
            Sector::Meso2 => "meso2",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Sector::FullDisk => "F",
            Sector::Conus => "C",
            Sector::Meso1 => "M1",
            Sector::Meso2 => "M2",
        };
        write!(f, "{}", code)
    }
}

/// Fields encoded in an ABI L1b file name.
#[derive(Debug, Clone, PartialEq)]
pub struct AbiFilename {
    /// Platform short name, e.g. `G16`
    pub platform: String,
    pub sector: Sector,
    pub scan_mode: u8,
    /// Band number 1..=16
    pub band: u8,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl AbiFilename {
    /// Parse a bare file name or the final component of a path/object key.
    pub fn parse(name: &str) -> NetCdfResult<Self> {
        let invalid = || NetCdfError::InvalidFilename(name.to_string());

        let base = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(invalid)?;
        let stem = base.strip_suffix(".nc").ok_or_else(invalid)?;

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 6 || parts[0] != "OR" {
            return Err(invalid());
        }

        // ABI-L1b-RadC-M3C01
        let product = parts[1].strip_prefix("ABI-L1b-Rad").ok_or_else(invalid)?;
        let (sector_code, mode_band) = product.split_once("-M").ok_or_else(invalid)?;
        let sector = Sector::parse(sector_code).ok_or_else(invalid)?;
        let (mode, band) = mode_band.split_once('C').ok_or_else(invalid)?;
        let scan_mode: u8 = mode.parse().map_err(|_| invalid())?;
        let band: u8 = band.parse().map_err(|_| invalid())?;
        if !(1..=16).contains(&band) {
            return Err(invalid());
        }

        let platform = parts[2];
        if !platform.starts_with('G') {
            return Err(invalid());
        }

        let start_time = parse_abi_time(parts[3].strip_prefix('s').ok_or_else(invalid)?)
            .ok_or_else(invalid)?;
        let end_time = parse_abi_time(parts[4].strip_prefix('e').ok_or_else(invalid)?)
            .ok_or_else(invalid)?;

        Ok(Self {
            platform: platform.to_string(),
            sector,
            scan_mode,
            band,
            start_time,
            end_time,
        })
    }

    /// Channel name, `C01`..`C16`.
    pub fn channel_name(&self) -> String {
        format!("C{:02}", self.band)
    }

    /// Long platform name, `GOES-16`.
    pub fn platform_name(&self) -> String {
        format!("GOES-{}", self.platform.trim_start_matches('G'))
    }
}

/// Parse `YYYYJJJHHMMSSt`.
fn parse_abi_time(s: &str) -> Option<DateTime<Utc>> {
    if s.len() != 14 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let doy: u32 = s[4..7].parse().ok()?;
    let hour: u32 = s[7..9].parse().ok()?;
    let minute: u32 = s[9..11].parse().ok()?;
    let second: u32 = s[11..13].parse().ok()?;
    let tenths: i64 = s[13..14].parse().ok()?;

    let naive = NaiveDate::from_yo_opt(year, doy)?.and_hms_opt(hour, minute, second)?;
    Some(Utc.from_utc_datetime(&naive) + Duration::milliseconds(tenths * 100))
}

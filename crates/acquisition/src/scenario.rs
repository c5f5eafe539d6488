//! Catalog of demonstration scenarios and selection of their files from a
//! bucket listing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use netcdf_parser::{AbiFilename, Sector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AcquisitionError, AcquisitionResult};

/// Number of ABI channels; every scenario covers all of them.
pub const CHANNEL_COUNT: usize = 16;

/// A fixed observation with a known set of input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// GOES-16 CONUS scan of a mid-latitude cyclone over the central US,
    /// 2019-03-14 00:02 UTC
    UsMidlatitudeCyclone,
}

impl Scenario {
    pub const ALL: [Scenario; 1] = [Scenario::UsMidlatitudeCyclone];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::UsMidlatitudeCyclone => "us_midlatitude_cyclone",
        }
    }

    pub fn bucket(&self) -> &'static str {
        match self {
            Scenario::UsMidlatitudeCyclone => "noaa-goes16",
        }
    }

    /// Hourly folder holding the scan.
    pub fn prefix(&self) -> &'static str {
        match self {
            Scenario::UsMidlatitudeCyclone => "ABI-L1b-RadC/2019/073/00/",
        }
    }

    /// Start-time token shared by every file of the scan.
    pub fn start_pattern(&self) -> &'static str {
        match self {
            Scenario::UsMidlatitudeCyclone => "s20190730002",
        }
    }

    /// Platform short name as it appears in file names.
    pub fn platform(&self) -> &'static str {
        match self {
            Scenario::UsMidlatitudeCyclone => "G16",
        }
    }

    pub fn sector(&self) -> Sector {
        match self {
            Scenario::UsMidlatitudeCyclone => Sector::Conus,
        }
    }

    /// Nominal scan start, to the minute. `None` only for an invalid
    /// calendar constant.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let (year, day_of_year, hour, minute) = match self {
            Scenario::UsMidlatitudeCyclone => (2019, 73, 0, 2),
        };
        let naive = NaiveDate::from_yo_opt(year, day_of_year)?.and_hms_opt(hour, minute, 0)?;
        Some(Utc.from_utc_datetime(&naive))
    }

    /// Anonymous HTTPS URL of an object in the scenario bucket.
    pub fn url_for(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket(), key)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = AcquisitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name() == wanted)
            .ok_or_else(|| AcquisitionError::UnknownScenario(s.to_string()))
    }
}

/// One file of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioFile {
    /// Object key (or local file name)
    pub key: String,
    /// Bare file name
    pub filename: String,
    /// Channel name, `C01`..`C16`
    pub channel: String,
    /// Object size when known from the listing
    pub size: Option<u64>,
}

impl ScenarioFile {
    pub fn url(&self, scenario: Scenario) -> String {
        scenario.url_for(&self.key)
    }
}

/// Whether `name` is an L1b file of `scenario`'s scan.
fn matches_scenario(name: &str, scenario: Scenario) -> Option<AbiFilename> {
    if !name.contains(scenario.start_pattern()) {
        return None;
    }
    let parsed = AbiFilename::parse(name).ok()?;
    let start = scenario.start_time()?;
    let in_minute = parsed.start_time >= start && parsed.start_time < start + Duration::minutes(1);
    (in_minute && parsed.platform == scenario.platform() && parsed.sector == scenario.sector())
        .then_some(parsed)
}

/// Pick the scenario's files out of a listing of `(key, size)` pairs.
///
/// Succeeds only with exactly one file per channel, ordered C01..C16.
pub fn select_scenario_files(
    listing: &[(String, Option<u64>)],
    scenario: Scenario,
) -> AcquisitionResult<Vec<ScenarioFile>> {
    let mut by_channel: BTreeMap<String, Vec<ScenarioFile>> = BTreeMap::new();
    for (key, size) in listing {
        let Some(parsed) = matches_scenario(key, scenario) else {
            continue;
        };
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let channel = parsed.channel_name();
        by_channel.entry(channel.clone()).or_default().push(ScenarioFile {
            key: key.clone(),
            filename,
            channel,
            size: *size,
        });
    }

    let missing: Vec<String> = (1..=CHANNEL_COUNT)
        .map(|b| format!("C{:02}", b))
        .filter(|c| !by_channel.contains_key(c))
        .collect();
    let duplicated: Vec<String> = by_channel
        .iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(c, _)| c.clone())
        .collect();

    if !missing.is_empty() || !duplicated.is_empty() {
        return Err(AcquisitionError::IncompleteListing {
            scenario: scenario.name().to_string(),
            found: by_channel.values().map(Vec::len).sum(),
            expected: CHANNEL_COUNT,
            missing,
            duplicated,
        });
    }

    debug!(scenario = %scenario, files = by_channel.len(), "Selected scenario files");
    Ok(by_channel.into_values().flatten().collect())
}

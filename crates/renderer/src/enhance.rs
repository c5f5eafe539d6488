//! Enhancement chains mapping physical values to the [0, 1] display range.
//!
//! An [`Enhancement`] is an ordered list of [`EnhancementOp`]s applied to
//! every channel of a raster. Per-channel parameters (stretch limits, gamma,
//! invert flags) may be given once for all channels or once per channel.
//! Whatever the chain does, the result is clipped to [0, 1]; NaN (no data)
//! passes through untouched.
//!
//! Definitions live in an [`EnhancementRegistry`], looked up by product name,
//! then by standard name, then falling back to a 2-98 % linear stretch.
//! Extra definitions are loaded from JSON:
//!
//! ```json
//! {
//!   "products": {
//!     "natural_color": [
//!       { "stretch": { "crude": { "min": [0.0], "max": [120.0] } } },
//!       { "gamma": [1.8] }
//!     ]
//!   },
//!   "standard_names": {
//!     "toa_brightness_temperature": [
//!       { "stretch": { "linear": { "min": 1.0, "max": 99.0 } } },
//!       { "invert": [true] }
//!     ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;
use scene::{ProductAttrs, Raster};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RenderError, RenderResult};

/// Rows handed to one worker when mapping values.
pub const DEFAULT_CHUNK_ROWS: usize = 1024;

/// `log10(0.0223)`, the reflectance floor of the CIRA stretch.
const CIRA_LOG_ROOT: f32 = -1.651_695;

/// Linear rescaling of a channel onto [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stretch {
    /// Limits taken from percentiles (0-100) of the channel's finite values
    Linear { min: f32, max: f32 },
    /// Fixed limits in physical units. `min > max` flips the ramp.
    Crude { min: Vec<f32>, max: Vec<f32> },
}

/// One step of an enhancement chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementOp {
    Stretch(Stretch),
    /// `v^(1/gamma)`
    Gamma(Vec<f32>),
    /// `1 - v` where set
    Invert(Vec<bool>),
    /// Logarithmic stretch for reflectances in percent
    CiraStretch,
    /// Clamp to [0, 1]
    Clip,
}

/// A named chain of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    pub name: String,
    pub operations: Vec<EnhancementOp>,
}

impl Enhancement {
    pub fn new(name: impl Into<String>, operations: Vec<EnhancementOp>) -> Self {
        Self {
            name: name.into(),
            operations,
        }
    }

    /// Linear stretch between the 2nd and 98th percentiles.
    pub fn default_linear() -> Self {
        Self::new(
            "default",
            vec![EnhancementOp::Stretch(Stretch::Linear {
                min: 2.0,
                max: 98.0,
            })],
        )
    }

    /// Check parameters that do not depend on the data.
    pub fn validate(&self) -> RenderResult<()> {
        for op in &self.operations {
            match op {
                EnhancementOp::Stretch(Stretch::Linear { min, max }) => {
                    if !(0.0..=100.0).contains(min) || !(0.0..=100.0).contains(max) || min >= max {
                        return Err(RenderError::invalid(
                            &self.name,
                            format!("linear stretch percentiles {}..{} must satisfy 0 <= min < max <= 100", min, max),
                        ));
                    }
                }
                EnhancementOp::Stretch(Stretch::Crude { min, max }) => {
                    if min.is_empty() || max.is_empty() {
                        return Err(RenderError::invalid(&self.name, "crude stretch needs limits"));
                    }
                }
                EnhancementOp::Gamma(gamma) => {
                    if gamma.is_empty() || gamma.iter().any(|g| g.is_nan() || *g <= 0.0) {
                        return Err(RenderError::invalid(&self.name, "gamma values must be positive"));
                    }
                }
                EnhancementOp::Invert(flags) => {
                    if flags.is_empty() {
                        return Err(RenderError::invalid(&self.name, "invert needs at least one flag"));
                    }
                }
                EnhancementOp::CiraStretch | EnhancementOp::Clip => {}
            }
        }
        Ok(())
    }

    /// Apply the chain to every channel of `raster`.
    ///
    /// The output has the same shape with every finite value in [0, 1].
    pub fn apply(&self, raster: &Raster, chunk_rows: usize) -> RenderResult<Raster> {
        self.validate()?;
        let chunk = chunk_rows.max(1) * raster.width.max(1);

        let mut channels = Vec::with_capacity(raster.band_count());
        for (band, source) in raster.channels.iter().enumerate() {
            let mut data = source.clone();
            for op in &self.operations {
                self.apply_op(op, band, &mut data, chunk)?;
            }
            map_values(&mut data, chunk, clip);
            channels.push(data);
        }

        Ok(Raster {
            width: raster.width,
            height: raster.height,
            channels,
        })
    }

    fn apply_op(
        &self,
        op: &EnhancementOp,
        band: usize,
        data: &mut [f32],
        chunk: usize,
    ) -> RenderResult<()> {
        match op {
            EnhancementOp::Stretch(Stretch::Linear { min, max }) => {
                let Some((lo, hi)) = percentile_limits(data, *min, *max) else {
                    // nothing finite to stretch
                    return Ok(());
                };
                if hi > lo {
                    map_values(data, chunk, |v| (v - lo) / (hi - lo));
                } else {
                    map_values(data, chunk, |v| if v.is_nan() { v } else { 0.0 });
                }
            }
            EnhancementOp::Stretch(Stretch::Crude { min, max }) => {
                let lo = self.per_band(min, band, "min")?;
                let hi = self.per_band(max, band, "max")?;
                if hi == lo {
                    return Err(RenderError::invalid(
                        &self.name,
                        format!("crude stretch limits are equal ({}) for band {}", lo, band),
                    ));
                }
                map_values(data, chunk, |v| (v - lo) / (hi - lo));
            }
            EnhancementOp::Gamma(gamma) => {
                let gamma = self.per_band(gamma, band, "gamma")?;
                if gamma != 1.0 {
                    let exponent = 1.0 / gamma;
                    map_values(data, chunk, |v| v.max(0.0).powf(exponent));
                }
            }
            EnhancementOp::Invert(flags) => {
                if self.per_band(flags, band, "invert")? {
                    map_values(data, chunk, |v| 1.0 - v);
                }
            }
            EnhancementOp::CiraStretch => {
                let denom = (1.0 - CIRA_LOG_ROOT) * 0.75;
                map_values(data, chunk, |v| {
                    ((v * 0.01).max(f32::EPSILON).log10() - CIRA_LOG_ROOT) / denom
                });
            }
            EnhancementOp::Clip => map_values(data, chunk, clip),
        }
        Ok(())
    }

    fn per_band<T: Copy>(&self, values: &[T], band: usize, what: &str) -> RenderResult<T> {
        match values {
            [single] => Ok(*single),
            _ => values.get(band).copied().ok_or_else(|| {
                RenderError::invalid(
                    &self.name,
                    format!("{} has {} values, none for band {}", what, values.len(), band),
                )
            }),
        }
    }
}

fn clip(v: f32) -> f32 {
    if v.is_nan() {
        v
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Map every value in place, one row chunk per task. NaN stays NaN.
fn map_values<F>(data: &mut [f32], chunk: usize, f: F)
where
    F: Fn(f32) -> f32 + Sync,
{
    data.par_chunks_mut(chunk).for_each(|rows| {
        for v in rows.iter_mut() {
            if !v.is_nan() {
                *v = f(*v);
            }
        }
    });
}

/// Values at the `low` and `high` percentiles of the finite entries.
fn percentile_limits(data: &[f32], low: f32, high: f32) -> Option<(f32, f32)> {
    let mut finite: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let last = finite.len() - 1;
    let rank = |p: f32| ((p / 100.0) * last as f32).round() as usize;

    let (lo_idx, hi_idx) = (rank(low).min(last), rank(high).min(last));
    let (_, lo, _) = finite.select_nth_unstable_by(lo_idx, f32::total_cmp);
    let lo = *lo;
    let (_, hi, _) = finite.select_nth_unstable_by(hi_idx, f32::total_cmp);
    Some((lo, *hi))
}

fn build_chains(
    chains: BTreeMap<String, Vec<EnhancementOp>>,
) -> RenderResult<BTreeMap<String, Enhancement>> {
    chains
        .into_iter()
        .map(|(key, operations)| {
            let enhancement = Enhancement::new(key.clone(), operations);
            enhancement.validate()?;
            Ok((key, enhancement))
        })
        .collect()
}

/// On-disk form of enhancement definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancementFile {
    #[serde(default)]
    pub products: BTreeMap<String, Vec<EnhancementOp>>,
    #[serde(default)]
    pub standard_names: BTreeMap<String, Vec<EnhancementOp>>,
}

/// Which entry of the registry served a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Name,
    StandardName,
    Default,
}

/// Enhancements keyed by product name and by standard name.
#[derive(Debug, Clone)]
pub struct EnhancementRegistry {
    by_name: BTreeMap<String, Enhancement>,
    by_standard_name: BTreeMap<String, Enhancement>,
    fallback: Enhancement,
    chunk_rows: usize,
}

impl Default for EnhancementRegistry {
    fn default() -> Self {
        Self::defaults()
    }
}

impl EnhancementRegistry {
    /// Registry with only the default linear stretch.
    pub fn empty() -> Self {
        Self {
            by_name: BTreeMap::new(),
            by_standard_name: BTreeMap::new(),
            fallback: Enhancement::default_linear(),
            chunk_rows: DEFAULT_CHUNK_ROWS,
        }
    }

    /// Built-in enhancements for the standard ABI composites.
    pub fn defaults() -> Self {
        let crude = |min: &[f32], max: &[f32]| {
            EnhancementOp::Stretch(Stretch::Crude {
                min: min.to_vec(),
                max: max.to_vec(),
            })
        };

        let mut registry = Self::empty();
        registry.insert_product("true_color", vec![EnhancementOp::CiraStretch]);
        registry.insert_product("true_color_raw", vec![crude(&[0.0], &[100.0])]);
        registry.insert_product(
            "natural_color",
            vec![crude(&[0.0], &[120.0]), EnhancementOp::Gamma(vec![1.8])],
        );
        registry.insert_product(
            "overview",
            vec![crude(&[0.0, 0.0, 295.0], &[100.0, 100.0, 230.0])],
        );
        registry.insert_product(
            "airmass",
            vec![crude(&[-25.0, -40.0, 243.9], &[0.0, 5.0, 208.5])],
        );
        registry.insert_product(
            "dust",
            vec![
                crude(&[-4.0, 0.0, 261.2], &[2.0, 15.0, 289.2]),
                EnhancementOp::Gamma(vec![1.0, 2.5, 1.0]),
            ],
        );
        registry.insert_product(
            "colorized_ir_clouds",
            vec![crude(&[193.15], &[313.15]), EnhancementOp::Invert(vec![true])],
        );

        registry.insert_standard_name(
            "toa_bidirectional_reflectance",
            vec![crude(&[0.0], &[100.0])],
        );
        registry.insert_standard_name(
            "toa_brightness_temperature",
            vec![crude(&[163.0], &[330.0]), EnhancementOp::Invert(vec![true])],
        );
        registry
    }

    /// Registry holding only the definitions in `json`.
    pub fn from_json(json: &str) -> RenderResult<Self> {
        let mut registry = Self::empty();
        registry.merge_json(json)?;
        Ok(registry)
    }

    /// Overlay the definitions in `json`, replacing entries with the same key.
    /// Nothing is merged unless every definition is valid.
    pub fn merge_json(&mut self, json: &str) -> RenderResult<()> {
        let file: EnhancementFile = serde_json::from_str(json)?;
        let products = build_chains(file.products)?;
        let standard_names = build_chains(file.standard_names)?;
        self.by_name.extend(products);
        self.by_standard_name.extend(standard_names);
        Ok(())
    }

    /// Overlay the definitions in a JSON file.
    pub fn merge_file(&mut self, path: impl AsRef<Path>) -> RenderResult<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RenderError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        self.merge_json(&content)?;
        debug!(path = %path.display(), "Merged enhancement definitions");
        Ok(())
    }

    pub fn insert_product(&mut self, name: &str, operations: Vec<EnhancementOp>) {
        self.by_name
            .insert(name.to_string(), Enhancement::new(name, operations));
    }

    pub fn insert_standard_name(&mut self, standard_name: &str, operations: Vec<EnhancementOp>) {
        self.by_standard_name.insert(
            standard_name.to_string(),
            Enhancement::new(standard_name, operations),
        );
    }

    /// Rows per parallel task when applying enhancements.
    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows.max(1);
        self
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    pub fn get(&self, name: &str) -> Option<&Enhancement> {
        self.by_name.get(name)
    }

    /// Enhancement for a product, and which key matched.
    pub fn find(&self, attrs: &ProductAttrs) -> (&Enhancement, MatchedBy) {
        if let Some(e) = self.by_name.get(&attrs.name) {
            (e, MatchedBy::Name)
        } else if let Some(e) = self.by_standard_name.get(&attrs.standard_name) {
            (e, MatchedBy::StandardName)
        } else {
            (&self.fallback, MatchedBy::Default)
        }
    }
}

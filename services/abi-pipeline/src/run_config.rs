//! Run file loading.
//!
//! A run file is YAML describing one workflow run; command line flags
//! override its fields.
//!
//! ```yaml
//! scenario: us_midlatitude_cyclone
//! products: [C01, C13, 0.47, true_color]
//! resampler: native
//! target: coarsest
//! bbox: "-105.0,30.0,-85.0,45.0"
//! render: [true_color]
//! ```

use std::path::{Path, PathBuf};

use acquisition::Scenario;
use anyhow::{Context, Result};
use scene::{ResampleMethod, ResampleTarget};
use scene_common::{AreaDefinition, BoundingBox, ProductKey};
use serde::Deserialize;
use tracing::info;

/// Products loaded when neither the run file nor the command line names any.
pub const DEFAULT_PRODUCTS: &[&str] = &["C01", "C02", "C03", "C13", "true_color"];

/// Contents of a run file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    #[serde(default)]
    pub scenario: Option<Scenario>,
    #[serde(default)]
    pub products: Vec<ProductKey>,
    #[serde(default)]
    pub resampler: Option<ResampleMethod>,
    #[serde(default)]
    pub target: Option<ResampleTarget>,
    /// `"west,south,east,north"` in degrees
    #[serde(default)]
    pub bbox: Option<String>,
    #[serde(default)]
    pub render: Vec<String>,
    #[serde(default)]
    pub enhancements: Option<PathBuf>,
}

impl RunFile {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse run file")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run file {}", path.display()))?;
        let run = Self::from_yaml(&content)
            .with_context(|| format!("Invalid run file {}", path.display()))?;
        info!(path = %path.display(), "Loaded run file");
        Ok(run)
    }
}

/// Load a bare `AreaDefinition` from YAML.
pub fn load_area(path: &Path) -> Result<AreaDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read area file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid area definition in {}", path.display()))
}

/// Command line values that take precedence over a run file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub scenario: Option<Scenario>,
    pub products: Vec<String>,
    pub resampler: Option<ResampleMethod>,
    pub area: Option<PathBuf>,
    pub bbox: Option<String>,
    pub render: Vec<String>,
    pub enhancements: Option<PathBuf>,
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub scenario: Scenario,
    pub products: Vec<ProductKey>,
    /// `None` uses the pipeline's default resampler
    pub resampler: Option<ResampleMethod>,
    pub target: ResampleTarget,
    pub bbox: Option<BoundingBox>,
    pub render: Vec<String>,
    pub enhancements: Option<PathBuf>,
}

impl RunPlan {
    pub fn resolve(file: RunFile, overrides: Overrides) -> Result<Self> {
        let mut products: Vec<ProductKey> = if !overrides.products.is_empty() {
            overrides.products.iter().map(|p| parse_key(p)).collect()
        } else if !file.products.is_empty() {
            file.products
        } else {
            DEFAULT_PRODUCTS.iter().map(|p| ProductKey::name(*p)).collect()
        };

        let render = if overrides.render.is_empty() {
            file.render
        } else {
            overrides.render
        };
        // rendered products have to be evaluated too
        for name in &render {
            let key = ProductKey::name(name.as_str());
            if !products.contains(&key) {
                products.push(key);
            }
        }

        let target = match overrides.area {
            Some(path) => ResampleTarget::Area(load_area(&path)?),
            None => file.target.unwrap_or(ResampleTarget::Coarsest),
        };

        let bbox = overrides
            .bbox
            .or(file.bbox)
            .map(|s| {
                s.parse::<BoundingBox>()
                    .with_context(|| format!("Invalid bounding box '{}'", s))
            })
            .transpose()?;

        Ok(Self {
            scenario: overrides
                .scenario
                .or(file.scenario)
                .unwrap_or(Scenario::UsMidlatitudeCyclone),
            products,
            resampler: overrides.resampler.or(file.resampler),
            target,
            bbox,
            render,
            enhancements: overrides.enhancements.or(file.enhancements),
        })
    }
}

fn parse_key(s: &str) -> ProductKey {
    match s.parse::<ProductKey>() {
        Ok(key) => key,
        Err(never) => match never {},
    }
}

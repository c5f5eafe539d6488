//! Composite recipes.
//!
//! A recipe names its prerequisites (raw channels or other recipes) and a
//! [`Compositor`], a pure function from the input rasters to the output
//! raster. Resolution of a recipe to the raw channels it needs is a
//! deterministic depth-first walk of the registry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use scene_common::ProductKey;

use crate::error::{SceneError, SceneResult};
use crate::raster::Raster;

/// Pure combination of input rasters.
#[derive(Debug, Clone, PartialEq)]
pub enum Compositor {
    /// Stack three single-band inputs as red, green, blue
    GenericRgb,
    /// Weighted sum of three inputs, used to synthesise a green band
    SimulatedGreen { fractions: [f32; 3] },
    /// First input minus second input
    Difference,
    /// Pass a single band through under a new name
    SingleBand,
}

impl Compositor {
    /// Number of inputs the compositor expects.
    pub fn input_count(&self) -> usize {
        match self {
            Compositor::GenericRgb | Compositor::SimulatedGreen { .. } => 3,
            Compositor::Difference => 2,
            Compositor::SingleBand => 1,
        }
    }

    /// Number of output channels.
    pub fn output_bands(&self) -> usize {
        match self {
            Compositor::GenericRgb => 3,
            _ => 1,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Compositor::GenericRgb => "RGB",
            _ => "L",
        }
    }

    /// Combine `inputs`. Every input must have the same shape; the first
    /// channel of each input is used.
    pub fn apply(&self, product: &str, inputs: &[Arc<Raster>]) -> SceneResult<Raster> {
        if inputs.len() != self.input_count() {
            return Err(SceneError::compositor(
                product,
                format!("expected {} inputs, got {}", self.input_count(), inputs.len()),
            ));
        }
        let (width, height) = (inputs[0].width, inputs[0].height);
        if let Some(bad) = inputs.iter().find(|r| (r.width, r.height) != (width, height)) {
            return Err(SceneError::compositor(
                product,
                format!(
                    "input shapes differ: {}x{} vs {}x{}",
                    width, height, bad.width, bad.height
                ),
            ));
        }
        let band = |i: usize| -> SceneResult<&[f32]> {
            inputs[i]
                .channel(0)
                .ok_or_else(|| SceneError::compositor(product, format!("input {} has no channels", i)))
        };

        match self {
            Compositor::GenericRgb => Raster::new(
                width,
                height,
                vec![band(0)?.to_vec(), band(1)?.to_vec(), band(2)?.to_vec()],
            ),
            Compositor::SimulatedGreen { fractions } => {
                let (a, b, c) = (band(0)?, band(1)?, band(2)?);
                let data = a
                    .iter()
                    .zip(b)
                    .zip(c)
                    .map(|((a, b), c)| a * fractions[0] + b * fractions[1] + c * fractions[2])
                    .collect();
                Raster::single(width, height, data)
            }
            Compositor::Difference => {
                let data = band(0)?.iter().zip(band(1)?).map(|(a, b)| a - b).collect();
                Raster::single(width, height, data)
            }
            Compositor::SingleBand => Raster::single(width, height, band(0)?.to_vec()),
        }
    }
}

/// Named composite definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub prerequisites: Vec<ProductKey>,
    pub compositor: Compositor,
    /// Hidden recipes are building blocks and not listed as available
    pub hidden: bool,
    pub standard_name: String,
}

impl Recipe {
    pub fn new(name: &str, prerequisites: &[&str], compositor: Compositor) -> Self {
        Self {
            name: name.to_string(),
            prerequisites: prerequisites.iter().map(|p| ProductKey::from(*p)).collect(),
            compositor,
            hidden: name.starts_with('_'),
            standard_name: name.trim_start_matches('_').to_string(),
        }
    }

    pub fn with_standard_name(mut self, standard_name: &str) -> Self {
        self.standard_name = standard_name.to_string();
        self
    }
}

/// Registry of composite recipes keyed by name.
#[derive(Debug, Clone, Default)]
pub struct RecipeRegistry {
    recipes: BTreeMap<String, Recipe>,
}

impl RecipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard ABI composites.
    pub fn abi_defaults() -> Self {
        use Compositor::*;

        let mut registry = Self::new();
        for recipe in [
            Recipe::new(
                "green",
                &["C01", "C02", "C03"],
                SimulatedGreen {
                    fractions: [0.465, 0.465, 0.07],
                },
            )
            .with_standard_name("toa_bidirectional_reflectance"),
            Recipe::new("true_color", &["C02", "green", "C01"], GenericRgb),
            Recipe::new("true_color_raw", &["C02", "green", "C01"], GenericRgb)
                .with_standard_name("true_color"),
            Recipe::new("natural_color", &["C05", "C03", "C02"], GenericRgb),
            Recipe::new("overview", &["C02", "C03", "C13"], GenericRgb),
            Recipe::new("_airmass_red", &["C08", "C10"], Difference),
            Recipe::new("_airmass_green", &["C12", "C13"], Difference),
            Recipe::new("airmass", &["_airmass_red", "_airmass_green", "C08"], GenericRgb),
            Recipe::new("_dust_red", &["C15", "C13"], Difference),
            Recipe::new("_dust_green", &["C14", "C11"], Difference),
            Recipe::new("dust", &["_dust_red", "_dust_green", "C13"], GenericRgb),
            Recipe::new("colorized_ir_clouds", &["C13"], SingleBand),
        ] {
            registry.register(recipe);
        }
        registry
    }

    /// Add or replace a recipe, returning the one it replaced.
    pub fn register(&mut self, recipe: Recipe) -> Option<Recipe> {
        self.recipes.insert(recipe.name.clone(), recipe)
    }

    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    /// Names of the visible recipes, sorted.
    pub fn names(&self) -> Vec<String> {
        self.recipes
            .values()
            .filter(|r| !r.hidden)
            .map(|r| r.name.clone())
            .collect()
    }

    /// Raw prerequisites needed to build `name`, in first-use order without
    /// duplicates.
    pub fn resolve(&self, name: &str) -> SceneResult<Vec<ProductKey>> {
        if !self.contains(name) {
            return Err(SceneError::unknown_product(name));
        }
        let mut leaves = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = Vec::new();
        self.walk(name, &mut stack, &mut seen, &mut leaves)?;
        Ok(leaves)
    }

    fn walk(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        seen: &mut BTreeSet<ProductKey>,
        leaves: &mut Vec<ProductKey>,
    ) -> SceneResult<()> {
        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(SceneError::RecipeCycle(cycle));
        }
        let Some(recipe) = self.recipes.get(name) else {
            return Err(SceneError::unknown_product(name));
        };

        stack.push(name.to_string());
        for prereq in &recipe.prerequisites {
            match prereq.as_name() {
                Some(sub) if self.contains(sub) => self.walk(sub, stack, seen, leaves)?,
                _ => {
                    if seen.insert(prereq.clone()) {
                        leaves.push(prereq.clone());
                    }
                }
            }
        }
        stack.pop();
        Ok(())
    }
}

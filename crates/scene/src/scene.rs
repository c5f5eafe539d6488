//! The scene: products loaded from a reader, resampled and cropped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use scene_common::{AreaDefinition, BoundingBox, GridRelation, ProductKey};
use tracing::{debug, info, instrument, warn};

use crate::crop::{pixel_window, PixelWindow};
use crate::error::{SceneError, SceneResult};
use crate::product::{LazyRaster, Product, ProductAttrs};
use crate::reader::{resolve_dataset, DatasetInfo, Reader};
use crate::recipes::{Recipe, RecipeRegistry};
use crate::resample::{native_relation, ResampleMethod, ResampleTarget, Resampler};

/// Outcome of [`Scene::load`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Requested names that are now loaded
    pub loaded: Vec<String>,
    /// Composites whose inputs do not share a grid yet
    pub deferred: Vec<String>,
    /// Keys that cannot be provided at all
    pub unresolved: Vec<(ProductKey, SceneError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.deferred.is_empty() && self.unresolved.is_empty()
    }
}

/// A collection of products bound to one reader.
///
/// Pixel data is never read while building a scene; every product holds a
/// [`LazyRaster`] that is computed on demand, usually through
/// [`crate::Pipeline::evaluate`]. `resample` and `crop` return new scenes and
/// leave `self` untouched.
#[derive(Clone)]
pub struct Scene {
    reader: Arc<dyn Reader>,
    registry: Arc<RecipeRegistry>,
    datasets: Vec<DatasetInfo>,
    /// Every built product, including prerequisites nobody asked for
    products: BTreeMap<String, Product>,
    /// Names the caller asked for
    wishlist: BTreeSet<String>,
    /// Wished composites that could not be built yet
    missing: BTreeSet<String>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("reader", &self.reader.name())
            .field("products", &self.products.keys().collect::<Vec<_>>())
            .field("wishlist", &self.wishlist)
            .field("missing", &self.missing)
            .finish()
    }
}

impl Scene {
    /// Bind a scene to a reader using the standard ABI recipes.
    pub fn new(reader: Arc<dyn Reader>) -> Self {
        Self::with_registry(reader, Arc::new(RecipeRegistry::abi_defaults()))
    }

    pub fn with_registry(reader: Arc<dyn Reader>, registry: Arc<RecipeRegistry>) -> Self {
        let datasets = reader.available_datasets();
        Self {
            reader,
            registry,
            datasets,
            products: BTreeMap::new(),
            wishlist: BTreeSet::new(),
            missing: BTreeSet::new(),
        }
    }

    pub fn reader_name(&self) -> &str {
        self.reader.name()
    }

    pub fn registry(&self) -> &RecipeRegistry {
        &self.registry
    }

    /// Raw dataset names the reader provides.
    pub fn available_dataset_names(&self) -> Vec<String> {
        self.datasets.iter().map(|d| d.name.clone()).collect()
    }

    /// Visible composites whose raw inputs are all provided by the reader.
    pub fn available_composite_names(&self) -> Vec<String> {
        self.registry
            .names()
            .into_iter()
            .filter(|name| match self.registry.resolve(name) {
                Ok(leaves) => leaves
                    .iter()
                    .all(|key| resolve_dataset(&self.datasets, key).is_some()),
                Err(_) => false,
            })
            .collect()
    }

    /// Raw datasets and every visible composite known to the registry.
    pub fn all_dataset_names(&self) -> Vec<String> {
        let mut names = self.available_dataset_names();
        names.extend(self.registry.names());
        names
    }

    /// Bind products for `keys`.
    ///
    /// Raw datasets get a deferred read. Composites load their inputs and are
    /// built when those share a grid; otherwise they are recorded as missing
    /// until a resample brings the inputs together.
    #[instrument(skip(self, keys), fields(reader = %self.reader.name(), requested = keys.len()))]
    pub fn load(&mut self, keys: &[ProductKey]) -> LoadReport {
        let mut report = LoadReport::default();

        for key in keys {
            if let Some(info) = resolve_dataset(&self.datasets, key).cloned() {
                self.ensure_raw(&info);
                self.wish(&info.name);
                report.loaded.push(info.name);
                continue;
            }

            let Some(name) = key.as_name().filter(|n| self.registry.contains(n)) else {
                warn!(key = %key, "Unknown product");
                report.unresolved.push((key.clone(), SceneError::unknown_product(key)));
                continue;
            };
            let name = name.to_string();

            match self.composite_leaves(&name) {
                Ok(leaves) => {
                    for info in leaves {
                        self.ensure_raw(&info);
                    }
                }
                Err(err) => {
                    warn!(product = %name, error = %err, "Composite cannot be provided");
                    report.unresolved.push((key.clone(), err));
                    continue;
                }
            }

            self.wishlist.insert(name.clone());
            match self.try_build(&name) {
                Ok(true) => {
                    self.missing.remove(&name);
                    report.loaded.push(name);
                }
                Ok(false) => {
                    debug!(product = %name, "Composite deferred until inputs share a grid");
                    self.missing.insert(name.clone());
                    report.deferred.push(name);
                }
                Err(err) => {
                    self.wishlist.remove(&name);
                    report.unresolved.push((key.clone(), err));
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            deferred = report.deferred.len(),
            unresolved = report.unresolved.len(),
            "Scene load finished"
        );
        report
    }

    /// Wished composites that are not built.
    pub fn missing_datasets(&self) -> &BTreeSet<String> {
        &self.missing
    }

    /// Wished products that are built, sorted.
    pub fn loaded_names(&self) -> Vec<String> {
        self.wishlist
            .iter()
            .filter(|n| self.products.contains_key(*n))
            .cloned()
            .collect()
    }

    /// Look up a loaded product. Names match loaded products first; a
    /// wavelength resolves through the reader's channel table.
    pub fn get(&self, key: &ProductKey) -> Option<&Product> {
        let name = match key {
            ProductKey::Name(name) => self
                .wishlist
                .iter()
                .find(|n| n.eq_ignore_ascii_case(name))?
                .clone(),
            ProductKey::Wavelength(_) => resolve_dataset(&self.datasets, key)?.name.clone(),
        };
        if !self.wishlist.contains(&name) {
            return None;
        }
        self.products.get(&name)
    }

    pub fn contains(&self, key: &ProductKey) -> bool {
        self.get(key).is_some()
    }

    /// Loaded products, sorted by name.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.wishlist.iter().filter_map(|n| self.products.get(n))
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Area with the largest pixels among built products.
    pub fn coarsest_area(&self) -> Option<&AreaDefinition> {
        self.products.values().map(|p| &p.area).fold(None, |acc, area| match acc {
            Some(best) if !area.coarser_than(best) => Some(best),
            _ => Some(area),
        })
    }

    /// Area with the smallest pixels among built products.
    pub fn finest_area(&self) -> Option<&AreaDefinition> {
        self.products.values().map(|p| &p.area).fold(None, |acc, area| match acc {
            Some(best) if !best.coarser_than(area) => Some(best),
            _ => Some(area),
        })
    }

    /// New scene with every raw product on the target grid and the wished
    /// composites rebuilt from the resampled inputs.
    ///
    /// Native resampling is checked up front: any product whose grid is not
    /// an integer multiple of the target fails the whole call.
    #[instrument(skip(self, target, resampler), fields(method = %method))]
    pub fn resample(
        &self,
        target: &ResampleTarget,
        method: ResampleMethod,
        resampler: &Resampler,
    ) -> SceneResult<Scene> {
        let dst = match target {
            ResampleTarget::Coarsest => self.coarsest_area().cloned(),
            ResampleTarget::Finest => self.finest_area().cloned(),
            ResampleTarget::Area(area) => Some(area.clone()),
        }
        .ok_or(SceneError::EmptyScene)?;

        if method != ResampleMethod::Native {
            projection::for_crs(&dst.crs)?;
        }

        let mut scene = self.derived();
        for product in self.products.values().filter(|p| !p.attrs.is_composite()) {
            let src = product.area.clone();
            if method == ResampleMethod::Native {
                native_relation(&src, &dst).map_err(|err| match err {
                    SceneError::IncompatibleAreas { detail, .. } => {
                        SceneError::incompatible(product.name(), detail)
                    }
                    other => other,
                })?;
            } else {
                projection::for_crs(&src.crs)?;
            }

            let data = if src == dst {
                product.data.clone()
            } else {
                let resampler = resampler.clone();
                let target = dst.clone();
                product.data.map(product.name(), move |raster| {
                    resampler.resample(raster, &src, &target, method)
                })
            };
            scene.products.insert(
                product.name().to_string(),
                Product {
                    attrs: product.attrs.clone(),
                    area: dst.clone(),
                    data,
                },
            );
        }

        scene.rebuild_composites()?;
        info!(
            target = %dst.area_id,
            loaded = scene.loaded_names().len(),
            missing = scene.missing.len(),
            "Scene resampled"
        );
        Ok(scene)
    }

    /// New scene with every product sliced to the pixels covering a lon/lat
    /// box. Pixel size and alignment are preserved.
    ///
    /// Areas aligned with the coarsest area use its window scaled by their
    /// resolution factor, so co-registered products stay co-registered.
    #[instrument(skip(self), fields(bbox = ?bbox))]
    pub fn crop(&self, bbox: &BoundingBox) -> SceneResult<Scene> {
        let coarsest = self.coarsest_area().cloned().ok_or(SceneError::EmptyScene)?;
        let outside = |area: &AreaDefinition| SceneError::CropOutsideCoverage {
            bbox: *bbox,
            area: area.area_id.clone(),
        };
        let coarse_window = pixel_window(&coarsest, bbox)?.ok_or_else(|| outside(&coarsest))?;

        let mut windows: Vec<(AreaDefinition, PixelWindow)> = Vec::new();
        let mut scene = self.derived();
        scene.wishlist = self.wishlist.clone();
        scene.missing = self.missing.clone();

        for product in self.products.values() {
            let window = match windows.iter().find(|(a, _)| *a == product.area) {
                Some((_, w)) => *w,
                None => {
                    let w = match coarsest.resolution_ratio(&product.area) {
                        Some(GridRelation::Same) => coarse_window,
                        Some(GridRelation::Refine(f)) => coarse_window.scaled(f),
                        _ => pixel_window(&product.area, bbox)?
                            .ok_or_else(|| outside(&product.area))?,
                    };
                    debug!(area = %product.area.area_id, ?w, "Crop window");
                    windows.push((product.area.clone(), w));
                    w
                }
            };

            let area = product.area.slice(window.cols, window.rows)?;
            let data = if window.is_full(&product.area) {
                product.data.clone()
            } else {
                product
                    .data
                    .map(product.name(), move |raster| raster.window(window.cols, window.rows))
            };
            scene.products.insert(
                product.name().to_string(),
                Product {
                    attrs: product.attrs.clone(),
                    area,
                    data,
                },
            );
        }

        info!(
            cols = coarse_window.width(),
            rows = coarse_window.height(),
            "Scene cropped"
        );
        Ok(scene)
    }

    /// Empty scene sharing reader and registry.
    fn derived(&self) -> Scene {
        Scene {
            reader: Arc::clone(&self.reader),
            registry: Arc::clone(&self.registry),
            datasets: self.datasets.clone(),
            products: BTreeMap::new(),
            wishlist: self.wishlist.clone(),
            missing: BTreeSet::new(),
        }
    }

    fn wish(&mut self, name: &str) {
        self.wishlist.insert(name.to_string());
        self.missing.remove(name);
    }

    /// Retry every wished composite; those still not buildable are missing.
    fn rebuild_composites(&mut self) -> SceneResult<()> {
        // Raw products are already in place, so whatever is wished and absent
        // is a composite
        let wished: Vec<String> = self
            .wishlist
            .iter()
            .filter(|n| !self.products.contains_key(*n))
            .cloned()
            .collect();
        for name in wished {
            if self.try_build(&name)? {
                self.missing.remove(&name);
            } else {
                self.missing.insert(name);
            }
        }
        Ok(())
    }

    /// Raw datasets needed by a composite.
    fn composite_leaves(&self, name: &str) -> SceneResult<Vec<DatasetInfo>> {
        self.registry
            .resolve(name)?
            .iter()
            .map(|key| {
                resolve_dataset(&self.datasets, key)
                    .cloned()
                    .ok_or_else(|| SceneError::MissingPrerequisite {
                        product: name.to_string(),
                        prerequisite: key.to_string(),
                    })
            })
            .collect()
    }

    fn ensure_raw(&mut self, info: &DatasetInfo) {
        if self.products.contains_key(&info.name) {
            return;
        }
        let reader = Arc::clone(&self.reader);
        let dataset = info.clone();
        let data = LazyRaster::new(info.name.clone(), move || reader.load_dataset(&dataset));
        self.products.insert(
            info.name.clone(),
            Product {
                attrs: info.attrs(),
                area: info.area.clone(),
                data,
            },
        );
    }

    /// Build a composite from built inputs. `Ok(false)` when an input is not
    /// available or the inputs do not share one grid.
    fn try_build(&mut self, name: &str) -> SceneResult<bool> {
        if self.products.contains_key(name) {
            return Ok(true);
        }
        let recipe: Recipe = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| SceneError::unknown_product(name))?;

        let mut inputs: Vec<Product> = Vec::with_capacity(recipe.prerequisites.len());
        for prereq in &recipe.prerequisites {
            let input_name = match resolve_dataset(&self.datasets, prereq) {
                Some(info) => info.name.clone(),
                None => {
                    let sub = prereq
                        .as_name()
                        .filter(|n| self.registry.contains(n))
                        .ok_or_else(|| SceneError::MissingPrerequisite {
                            product: name.to_string(),
                            prerequisite: prereq.to_string(),
                        })?
                        .to_string();
                    if !self.try_build(&sub)? {
                        return Ok(false);
                    }
                    sub
                }
            };
            match self.products.get(&input_name) {
                Some(product) => inputs.push(product.clone()),
                None => return Ok(false),
            }
        }

        let Some(first) = inputs.first() else {
            return Err(SceneError::compositor(name, "recipe has no prerequisites"));
        };
        let area = first.area.clone();
        if let Some(other) = inputs.iter().find(|p| !p.area.same_grid(&area)) {
            debug!(
                product = %name,
                first = %area.area_id,
                other = %other.area.area_id,
                "Composite inputs on different grids"
            );
            return Ok(false);
        }

        let units = if inputs.iter().all(|p| p.attrs.units == first.attrs.units) {
            first.attrs.units.clone()
        } else {
            String::new()
        };
        let attrs = ProductAttrs {
            name: recipe.name.clone(),
            units,
            standard_name: recipe.standard_name.clone(),
            wavelength: None,
            calibration: None,
            mode: recipe.compositor.mode().to_string(),
            start_time: first.attrs.start_time,
            platform_name: first.attrs.platform_name.clone(),
            sensor: first.attrs.sensor.clone(),
            prerequisites: inputs.iter().map(|p| p.name().to_string()).collect(),
        };

        let sources: Vec<LazyRaster> = inputs.iter().map(|p| p.data.clone()).collect();
        let compositor = recipe.compositor.clone();
        let product_name = recipe.name.clone();
        let data = LazyRaster::new(recipe.name.clone(), move || {
            let rasters = sources
                .iter()
                .map(|s| s.compute())
                .collect::<SceneResult<Vec<_>>>()?;
            compositor.apply(&product_name, &rasters)
        });

        self.products
            .insert(recipe.name.clone(), Product { attrs, area, data });
        Ok(true)
    }
}

//! Display rendering for scene products.
//!
//! A product's physical values go through an enhancement chain picked from
//! an [`EnhancementRegistry`], are interleaved into a channel-last
//! [`EnhancedImage`] and can then be encoded as PNG.

pub mod enhance;
pub mod error;
pub mod image;
pub mod png;

pub use enhance::{
    Enhancement, EnhancementFile, EnhancementOp, EnhancementRegistry, MatchedBy, Stretch,
};
pub use error::{RenderError, RenderResult};
pub use image::EnhancedImage;

use scene::{ProductAttrs, Raster};
use tracing::debug;

/// Enhance one product for display.
///
/// Single-band products become grey images, three- and four-band products
/// RGB(A). Nothing is cached between calls. Row chunks run on the current
/// rayon pool.
pub fn render_product(
    raster: &Raster,
    attrs: &ProductAttrs,
    registry: &EnhancementRegistry,
) -> RenderResult<EnhancedImage> {
    let bands = raster.band_count();
    if !matches!(bands, 1 | 3 | 4) {
        return Err(RenderError::UnsupportedBands {
            product: attrs.name.clone(),
            bands,
        });
    }

    let (enhancement, matched) = registry.find(attrs);
    debug!(
        product = %attrs.name,
        enhancement = %enhancement.name,
        matched = ?matched,
        width = raster.width,
        height = raster.height,
        "Rendering product"
    );
    let enhanced = enhancement.apply(raster, registry.chunk_rows())?;
    Ok(EnhancedImage::from_raster(&enhanced))
}

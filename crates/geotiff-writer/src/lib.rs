//! GeoTIFF export of evaluated scene products.
//!
//! Files are tiled, compressed and carry power-of-two overviews, the layout
//! of a cloud optimised GeoTIFF. Products must already be evaluated; nothing
//! here triggers computation.

pub mod error;
pub mod options;
pub mod writer;

pub use error::{ExportError, ExportResult};
pub use options::ExportOptions;
pub use writer::{
    inspect_geotiff, output_filename, save_datasets, write_geotiff, ExportReport, GeoTiffInfo,
};

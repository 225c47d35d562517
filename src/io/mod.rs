//! I/O modules for ENVI headers, raster pairs and GeoTIFF output

pub mod header;
pub mod duplicate;
pub mod geotiff;

pub use header::{read_envi_header, read_header_info, EnviHeader};
pub use duplicate::RasterDuplicator;
pub use geotiff::{raster_shape, save_geotiff_f32};

//! enviconv: int64 ENVI raster conversion
//!
//! Turns band-sequential ENVI rasters of 64-bit integer pixels into rescaled
//! Float32 GeoTIFFs or into float64 ENVI copies widened in place, keeping the
//! sidecar header geometry and georeferencing.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    ByteOrder, ConversionParams, ConvertError, ConvertResult, GeoTransform, RasterImage,
    RasterShape, WidenStrategy,
};

pub use io::{read_envi_header, read_header_info, EnviHeader, RasterDuplicator};
pub use crate::core::{
    convert_to_envi_float64, convert_to_tiff_float32, transform_with_rotation, PixelReinterpreter,
    PixelScale, RasterConverter,
};

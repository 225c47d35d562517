//! Core conversion modules

pub mod rotate;
pub mod reinterpret;
pub mod convert;

// Re-export main types
pub use rotate::transform_with_rotation;
pub use reinterpret::{read_scaled, PixelReinterpreter, PixelScale};
pub use convert::{convert_to_envi_float64, convert_to_tiff_float32, RasterConverter};

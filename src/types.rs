use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 2D float raster array (rows x columns)
pub type RasterImage = ndarray::Array2<f64>;

/// ENVI `data type` code for 32-bit float
pub const ENVI_FLOAT32: u32 = 4;
/// ENVI `data type` code for 64-bit float
pub const ENVI_FLOAT64: u32 = 5;
/// ENVI `data type` code for 64-bit signed integer
pub const ENVI_INT64: u32 = 14;

/// Geospatial transformation parameters, GDAL ordering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform from an origin and positive pixel sizes
    pub fn north_up(origin_x: f64, origin_y: f64, x_res: f64, y_res: f64) -> Self {
        Self {
            top_left_x: origin_x,
            pixel_width: x_res,
            rotation_x: 0.0,
            top_left_y: origin_y,
            rotation_y: 0.0,
            pixel_height: -y_res,
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    pub fn from_array(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }
}

impl From<[f64; 6]> for GeoTransform {
    fn from(gt: [f64; 6]) -> Self {
        Self::from_array(gt)
    }
}

impl From<GeoTransform> for [f64; 6] {
    fn from(gt: GeoTransform) -> Self {
        gt.to_array()
    }
}

/// Raster geometry, shape ordering (rows, columns, bands)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterShape {
    pub rows: usize,
    pub columns: usize,
    pub bands: usize,
}

impl RasterShape {
    pub fn new(rows: usize, columns: usize, bands: usize) -> Self {
        Self { rows, columns, bands }
    }

    /// Number of pixels across all bands
    pub fn element_count(&self) -> ConvertResult<usize> {
        self.rows
            .checked_mul(self.columns)
            .and_then(|n| n.checked_mul(self.bands))
            .ok_or_else(|| ConvertError::ShapeMismatch {
                what: format!("element count of {} overflows", self),
                expected: usize::MAX,
                actual: 0,
            })
    }

    /// Byte length of a flat buffer holding this shape with `element_size` bytes per pixel
    pub fn byte_len(&self, element_size: usize) -> ConvertResult<usize> {
        self.element_count()?
            .checked_mul(element_size)
            .ok_or_else(|| ConvertError::ShapeMismatch {
                what: format!("byte length of {} overflows", self),
                expected: usize::MAX,
                actual: 0,
            })
    }

    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.rows, self.columns, self.bands)
    }
}

impl std::fmt::Display for RasterShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} rows, {} columns, {} bands)", self.rows, self.columns, self.bands)
    }
}

/// Byte order of raw pixel data (ENVI `byte order` key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Map an ENVI `byte order` code (0 = little endian, 1 = big endian)
    pub fn from_envi_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ByteOrder::Little),
            1 => Some(ByteOrder::Big),
            _ => None,
        }
    }

    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn is_native(&self) -> bool {
        *self == Self::native()
    }

    pub fn decode_i64(&self, bytes: [u8; 8]) -> i64 {
        match self {
            ByteOrder::Little => i64::from_le_bytes(bytes),
            ByteOrder::Big => i64::from_be_bytes(bytes),
        }
    }

    pub fn encode_f64(&self, value: f64) -> [u8; 8] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteOrder::Little => write!(f, "little-endian"),
            ByteOrder::Big => write!(f, "big-endian"),
        }
    }
}

/// How the in-place int64 -> float64 widening touches the target file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WidenStrategy {
    /// Memory-map files at or above `mmap_threshold_bytes`, buffer smaller ones
    #[default]
    Auto,
    /// Read, cast and rewrite through ordinary buffers
    Buffered,
    /// Cast directly between two memory mappings
    MemoryMapped,
}

impl std::str::FromStr for WidenStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(WidenStrategy::Auto),
            "buffered" => Ok(WidenStrategy::Buffered),
            "mmap" | "memory-mapped" => Ok(WidenStrategy::MemoryMapped),
            _ => Err(format!("Invalid widen strategy: {}", s)),
        }
    }
}

/// Conversion parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Raw values are divided by this before the offset is added
    pub scale_divisor: f64,
    /// Added to the divided value (decicelsius-style kelvin to celsius by default)
    pub scale_offset: f64,
    /// EPSG code of the GeoTIFF spatial reference
    pub epsg: u32,
    /// Suffix inserted before the extension of duplicated rasters
    pub tag: String,
    /// Line written over the first `data type = ` line of a duplicated header
    pub data_type_line: String,
    /// Rotation applied to the GeoTIFF geotransform, in degrees
    pub rotation_degrees: Option<f64>,
    pub widen_strategy: WidenStrategy,
    /// `WidenStrategy::Auto` maps files of at least this many bytes
    pub mmap_threshold_bytes: u64,
}

impl Default for ConversionParams {
    fn default() -> Self {
        Self {
            scale_divisor: 100.0,
            scale_offset: -273.15,
            epsg: 4326,
            tag: "_converted".to_string(),
            data_type_line: format!("data type = {} \n", ENVI_FLOAT64),
            rotation_degrees: None,
            widen_strategy: WidenStrategy::Auto,
            mmap_threshold_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Error types for raster conversion
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Header parse error: {0}")]
    HeaderParse(String),

    #[error("Shape mismatch: {what} (expected {expected}, found {actual})")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl ConvertError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::FileAccess {
            path: path.into(),
            source,
        }
    }
}

/// Result type for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;

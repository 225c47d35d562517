//! End-to-end conversions of int64 ENVI rasters

use crate::core::reinterpret::{check_file_len, read_scaled, PixelReinterpreter, PixelScale};
use crate::io::duplicate::RasterDuplicator;
use crate::io::geotiff::{raster_shape, save_geotiff_f32};
use crate::io::header::read_envi_header;
use crate::types::{ConversionParams, ConvertError, ConvertResult, ENVI_INT64};
use std::path::{Path, PathBuf};

/// Runs conversions with a fixed set of parameters
pub struct RasterConverter {
    params: ConversionParams,
}

impl Default for RasterConverter {
    fn default() -> Self {
        Self::new(ConversionParams::default())
    }
}

impl RasterConverter {
    pub fn new(params: ConversionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConversionParams {
        &self.params
    }

    /// Convert an int64 raster into a rescaled Float32 GeoTIFF at `target`
    pub fn to_geotiff(&self, source: &Path, target: &Path) -> ConvertResult<PathBuf> {
        log::info!("Converting {} to Float32 GeoTIFF", source.display());

        let header = read_envi_header(source)?;
        header.ensure_no_offset()?;
        if header.data_type != Some(ENVI_INT64) {
            log::warn!(
                "Header declares data type {:?}, pixels are read as int64 regardless",
                header.data_type
            );
        }

        let scale = PixelScale::new(self.params.scale_divisor, self.params.scale_offset);
        let image = read_scaled(source, header.rows, header.columns, header.byte_order, scale)?;

        let transform = match self.params.rotation_degrees {
            Some(degrees) => {
                let rotated = header.geo_transform.rotated(degrees);
                log::debug!("Rotated geotransform by {} degrees: {:?}", degrees, rotated.to_array());
                rotated
            }
            None => header.geo_transform,
        };

        save_geotiff_f32(&image, &transform, self.params.epsg, target)?;
        Ok(target.to_path_buf())
    }

    /// Duplicate an int64 raster pair and widen the copy to float64 in place
    ///
    /// The source header is parsed and the source size validated before the copy
    /// is created. Returns the path of the converted pixel file.
    pub fn to_envi_float64(&self, source: &Path) -> ConvertResult<PathBuf> {
        log::info!("Converting {} to float64 ENVI", source.display());

        let header = read_envi_header(source)?;
        header.ensure_no_offset()?;
        let declared = header.shape();
        check_file_len(source, declared)?;

        let target = RasterDuplicator::duplicate(source, &self.params.tag, &self.params.data_type_line)?;

        let reported = raster_shape(&target)?;
        if reported != declared {
            return Err(ConvertError::ShapeMismatch {
                what: format!(
                    "header declares {} but GDAL reports {} for {}",
                    declared,
                    reported,
                    target.display()
                ),
                expected: declared.element_count()?,
                actual: reported.element_count()?,
            });
        }

        PixelReinterpreter::new(reported, header.byte_order).widen(
            source,
            &target,
            self.params.widen_strategy,
            self.params.mmap_threshold_bytes,
        )?;

        log::info!("Converted raster written to {}", target.display());
        Ok(target)
    }
}

/// Convert to a Float32 GeoTIFF in the given EPSG spatial reference, default scaling
pub fn convert_to_tiff_float32<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    target: Q,
    epsg: u32,
) -> ConvertResult<PathBuf> {
    let params = ConversionParams {
        epsg,
        ..ConversionParams::default()
    };
    RasterConverter::new(params).to_geotiff(source.as_ref(), target.as_ref())
}

/// Convert to a float64 ENVI copy tagged `_converted`
pub fn convert_to_envi_float64<P: AsRef<Path>>(source: P) -> ConvertResult<PathBuf> {
    RasterConverter::default().to_envi_float64(source.as_ref())
}

use crate::types::{ConvertResult, GeoTransform, RasterImage, RasterShape};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use std::path::Path;

/// Geometry of a raster as reported by GDAL
pub fn raster_shape<P: AsRef<Path>>(raster_path: P) -> ConvertResult<RasterShape> {
    let dataset = Dataset::open(raster_path.as_ref())?;
    let (columns, rows) = dataset.raster_size();
    let bands = dataset.raster_count() as usize;

    log::debug!(
        "GDAL reports {} bands, {} columns, {} rows for {}",
        bands,
        columns,
        rows,
        raster_path.as_ref().display()
    );
    Ok(RasterShape::new(rows, columns, bands))
}

/// Well-known-text of an EPSG spatial reference
pub fn epsg_to_wkt(epsg: u32) -> ConvertResult<String> {
    Ok(SpatialRef::from_epsg(epsg)?.to_wkt()?)
}

/// Save a float image as a single-band Float32 GeoTIFF
pub fn save_geotiff_f32<P: AsRef<Path>>(
    image: &RasterImage,
    transform: &GeoTransform,
    epsg: u32,
    output_path: P,
) -> ConvertResult<()> {
    log::info!("Saving Float32 GeoTIFF: {}", output_path.as_ref().display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = image.dim();

    let mut dataset = driver.create_with_band_type::<f32, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        1,
    )?;

    dataset.set_geo_transform(&transform.to_array())?;
    dataset.set_projection(&epsg_to_wkt(epsg)?)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<f32> = image.iter().map(|&v| v as f32).collect();
    let buffer = Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;

    log::info!("GeoTIFF saved: {}x{} EPSG:{}", width, height, epsg);
    Ok(())
}

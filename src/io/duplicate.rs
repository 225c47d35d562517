use crate::io::header::{header_path, rewrite_data_type_line};
use crate::types::{ConvertError, ConvertResult};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Pixel and header paths of a tagged copy of `raster_path`
///
/// `scene.bsq` with tag `_converted` gives `scene_converted.bsq` and `scene_converted.hdr`.
pub fn tagged_paths<P: AsRef<Path>>(raster_path: P, tag: &str) -> ConvertResult<(PathBuf, PathBuf)> {
    let path = raster_path.as_ref();
    let stem = path.file_stem().ok_or_else(|| {
        ConvertError::InvalidFormat(format!("raster path has no file name: {}", path.display()))
    })?;

    let mut base = OsString::from(stem);
    base.push(tag);

    let mut raster_name = base.clone();
    if let Some(ext) = path.extension() {
        raster_name.push(".");
        raster_name.push(ext);
    }

    let mut header_name = base;
    header_name.push(".hdr");

    Ok((path.with_file_name(raster_name), path.with_file_name(header_name)))
}

/// Raster pair duplication
pub struct RasterDuplicator;

impl RasterDuplicator {
    /// Copy a raster and its header to tagged paths and rewrite the copy's data type line
    ///
    /// Existing targets are overwritten. Returns the path of the copied pixel file.
    pub fn duplicate<P: AsRef<Path>>(
        source_raster: P,
        tag: &str,
        data_type_line: &str,
    ) -> ConvertResult<PathBuf> {
        let source_raster = source_raster.as_ref();
        let source_header = header_path(source_raster);
        let (target_raster, target_header) = tagged_paths(source_raster, tag)?;

        if target_raster == source_raster {
            return Err(ConvertError::InvalidFormat(format!(
                "duplicate of {} would overwrite its source",
                source_raster.display()
            )));
        }

        log::info!("Creating {}", target_raster.display());

        fs::copy(source_raster, &target_raster)
            .map_err(|e| ConvertError::file_access(source_raster, e))?;
        fs::copy(&source_header, &target_header)
            .map_err(|e| ConvertError::file_access(&source_header, e))?;

        rewrite_data_type_line(&target_header, data_type_line)?;

        log::info!("Done");
        Ok(target_raster)
    }
}

use crate::types::{
    ByteOrder, ConvertError, ConvertResult, RasterImage, RasterShape, WidenStrategy,
};
use memmap2::{Mmap, MmapMut};
use ndarray::{Array2, ArrayView3, ArrayViewMut3, Zip};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Bytes per pixel of both int64 and float64 buffers
const PIXEL_BYTES: usize = 8;

/// Affine rescale applied when widening raw counts, `raw / divisor + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScale {
    pub divisor: f64,
    pub offset: f64,
}

impl PixelScale {
    pub fn new(divisor: f64, offset: f64) -> Self {
        Self { divisor, offset }
    }

    #[inline]
    pub fn apply(&self, raw: i64) -> f64 {
        raw as f64 / self.divisor + self.offset
    }
}

impl Default for PixelScale {
    fn default() -> Self {
        Self::new(100.0, -273.15)
    }
}

/// Decode a flat int64 buffer
pub fn decode_i64(bytes: &[u8], byte_order: ByteOrder) -> Vec<i64> {
    bytes
        .chunks_exact(PIXEL_BYTES)
        .map(|chunk| {
            let mut raw = [0u8; PIXEL_BYTES];
            raw.copy_from_slice(chunk);
            byte_order.decode_i64(raw)
        })
        .collect()
}

/// Fail unless the file at `path` holds exactly `shape` pixels of 8 bytes
pub fn check_file_len(path: &Path, shape: RasterShape) -> ConvertResult<u64> {
    let expected = shape.byte_len(PIXEL_BYTES)?;
    let actual = fs::metadata(path)
        .map_err(|e| ConvertError::file_access(path, e))?
        .len();

    if actual != expected as u64 {
        return Err(ConvertError::ShapeMismatch {
            what: format!("byte length of {} for shape {}", path.display(), shape),
            expected,
            actual: usize::try_from(actual).unwrap_or(usize::MAX),
        });
    }
    Ok(actual)
}

/// Read a single-band int64 raster, widen and rescale it to a (rows, columns) array
pub fn read_scaled(
    raster_path: &Path,
    rows: usize,
    columns: usize,
    byte_order: ByteOrder,
    scale: PixelScale,
) -> ConvertResult<RasterImage> {
    let shape = RasterShape::new(rows, columns, 1);
    log::info!("Reading int64 pixels from: {}", raster_path.display());

    let bytes = fs::read(raster_path).map_err(|e| ConvertError::file_access(raster_path, e))?;
    let expected = shape.byte_len(PIXEL_BYTES)?;
    if bytes.len() != expected {
        return Err(ConvertError::ShapeMismatch {
            what: format!("byte length of {} for shape {}", raster_path.display(), shape),
            expected,
            actual: bytes.len(),
        });
    }

    let values: Vec<f64> = decode_i64(&bytes, byte_order)
        .into_iter()
        .map(|raw| scale.apply(raw))
        .collect();

    Array2::from_shape_vec((rows, columns), values).map_err(|e| ConvertError::ShapeMismatch {
        what: format!("reshape to ({}, {}): {}", rows, columns, e),
        expected,
        actual: bytes.len(),
    })
}

/// Writes the float64 cast of an int64 raster over a same-sized copy of it
pub struct PixelReinterpreter {
    shape: RasterShape,
    byte_order: ByteOrder,
}

impl PixelReinterpreter {
    pub fn new(shape: RasterShape, byte_order: ByteOrder) -> Self {
        Self { shape, byte_order }
    }

    pub fn shape(&self) -> RasterShape {
        self.shape
    }

    /// Widen `source` into `target`, picking buffered or mapped I/O per `strategy`
    pub fn widen(
        &self,
        source: &Path,
        target: &Path,
        strategy: WidenStrategy,
        mmap_threshold_bytes: u64,
    ) -> ConvertResult<()> {
        let source_len = check_file_len(source, self.shape)?;
        check_file_len(target, self.shape)?;

        let use_mmap = uses_mapping(strategy, source_len, mmap_threshold_bytes);

        log::info!(
            "Widening int64 -> float64 {} ({}, {})",
            self.shape,
            self.byte_order,
            if use_mmap { "memory-mapped" } else { "buffered" }
        );

        if use_mmap {
            self.widen_mapped(source, target)
        } else {
            self.widen_buffered(source, target)
        }
    }

    /// Read the source, cast, and overwrite the target's bytes through ordinary I/O
    pub fn widen_buffered(&self, source: &Path, target: &Path) -> ConvertResult<()> {
        check_file_len(source, self.shape)?;
        check_file_len(target, self.shape)?;

        let bytes = fs::read(source).map_err(|e| ConvertError::file_access(source, e))?;
        let expected = self.shape.byte_len(PIXEL_BYTES)?;
        if bytes.len() != expected {
            return Err(ConvertError::ShapeMismatch {
                what: format!("byte length of {} changed while reading", source.display()),
                expected,
                actual: bytes.len(),
            });
        }

        let mut out = Vec::with_capacity(bytes.len());
        for raw in decode_i64(&bytes, self.byte_order) {
            out.extend_from_slice(&self.byte_order.encode_f64(raw as f64));
        }

        let mut file = OpenOptions::new()
            .write(true)
            .open(target)
            .map_err(|e| ConvertError::file_access(target, e))?;
        file.write_all(&out)
            .and_then(|_| file.sync_all())
            .map_err(|e| ConvertError::file_access(target, e))?;

        log::debug!("Wrote {} float64 pixels to {}", out.len() / PIXEL_BYTES, target.display());
        Ok(())
    }

    /// Map both files and write the cast of the whole source into the target mapping
    ///
    /// File lengths are checked before either mapping exists. The target mapping is
    /// flushed before returning; both mappings are released on every exit path.
    pub fn widen_mapped(&self, source: &Path, target: &Path) -> ConvertResult<()> {
        check_file_len(source, self.shape)?;
        check_file_len(target, self.shape)?;
        let expected = self.shape.byte_len(PIXEL_BYTES)?;
        let dim = self.shape.as_tuple();

        let source_file = File::open(source).map_err(|e| ConvertError::file_access(source, e))?;
        let target_file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(target)
            .map_err(|e| ConvertError::file_access(target, e))?;

        // Safety: the files are not resized by this process while mapped, and lengths
        // are re-checked against the mappings below.
        let source_map = unsafe { Mmap::map(&source_file) }
            .map_err(|e| ConvertError::file_access(source, e))?;
        let mut target_map = unsafe { MmapMut::map_mut(&target_file) }
            .map_err(|e| ConvertError::file_access(target, e))?;

        for (path, len) in [(source, source_map.len()), (target, target_map.len())] {
            if len != expected {
                return Err(ConvertError::ShapeMismatch {
                    what: format!("mapped length of {}", path.display()),
                    expected,
                    actual: len,
                });
            }
        }

        {
            let src: &[i64] = bytemuck::try_cast_slice(&source_map[..])
                .map_err(|e| ConvertError::InvalidFormat(format!("source mapping: {:?}", e)))?;
            let dst: &mut [f64] = bytemuck::try_cast_slice_mut(&mut target_map[..])
                .map_err(|e| ConvertError::InvalidFormat(format!("target mapping: {:?}", e)))?;

            let src = ArrayView3::from_shape(dim, src).map_err(|e| shape_error(self.shape, e))?;
            let dst = ArrayViewMut3::from_shape(dim, dst).map_err(|e| shape_error(self.shape, e))?;
            cast_into(dst, src, self.byte_order);
        }

        target_map.flush().map_err(|e| ConvertError::file_access(target, e))?;
        log::debug!("Flushed memory-mapped target {}", target.display());
        Ok(())
    }
}

/// Whether `strategy` maps a file of `file_len` bytes
pub fn uses_mapping(strategy: WidenStrategy, file_len: u64, mmap_threshold_bytes: u64) -> bool {
    match strategy {
        WidenStrategy::Auto => file_len >= mmap_threshold_bytes,
        WidenStrategy::Buffered => false,
        WidenStrategy::MemoryMapped => true,
    }
}

fn shape_error(shape: RasterShape, e: ndarray::ShapeError) -> ConvertError {
    ConvertError::ShapeMismatch {
        what: format!("view of {}: {}", shape, e),
        expected: shape.element_count().unwrap_or(usize::MAX),
        actual: 0,
    }
}

/// Element-wise int64 -> float64 cast between views of natively mapped bytes
fn cast_into(dst: ArrayViewMut3<f64>, src: ArrayView3<i64>, byte_order: ByteOrder) {
    let native = byte_order.is_native();
    let cast = move |d: &mut f64, s: &i64| {
        if native {
            *d = *s as f64;
        } else {
            let value = s.swap_bytes() as f64;
            *d = f64::from_bits(value.to_bits().swap_bytes());
        }
    };

    let zip = Zip::from(dst).and(src);
    #[cfg(feature = "parallel")]
    zip.par_for_each(cast);
    #[cfg(not(feature = "parallel"))]
    zip.for_each(cast);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    fn write_i64(path: &Path, values: &[i64], order: ByteOrder) {
        let bytes: Vec<u8> = values
            .iter()
            .flat_map(|v| match order {
                ByteOrder::Little => v.to_le_bytes(),
                ByteOrder::Big => v.to_be_bytes(),
            })
            .collect();
        fs::write(path, bytes).unwrap();
    }

    fn read_f64(path: &Path, order: ByteOrder) -> Vec<f64> {
        fs::read(path)
            .unwrap()
            .chunks_exact(8)
            .map(|c| {
                let raw: [u8; 8] = c.try_into().unwrap();
                match order {
                    ByteOrder::Little => f64::from_le_bytes(raw),
                    ByteOrder::Big => f64::from_be_bytes(raw),
                }
            })
            .collect()
    }

    #[test]
    fn test_scale_values() {
        let scale = PixelScale::default();
        assert_eq!(scale.apply(27315), 0.0);
        assert_eq!(scale.apply(0), -273.15);
        assert_abs_diff_eq!(scale.apply(-100), -274.15, epsilon = 1e-12);
    }

    #[test]
    fn test_read_scaled_shape_and_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lst.bsq");
        write_i64(&path, &[27315, 0, -100, 29315, 27415, 100], ByteOrder::Little);

        let image = read_scaled(&path, 2, 3, ByteOrder::Little, PixelScale::default()).unwrap();
        assert_eq!(image.dim(), (2, 3));
        assert_eq!(image[[0, 0]], 0.0);
        assert_eq!(image[[0, 1]], -273.15);
        assert_abs_diff_eq!(image[[0, 2]], -274.15, epsilon = 1e-12);
        assert_abs_diff_eq!(image[[1, 0]], 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(image[[1, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(image[[1, 2]], -272.15, epsilon = 1e-12);
    }

    #[test]
    fn test_read_scaled_big_endian() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lst.bsq");
        write_i64(&path, &[27315, 27415], ByteOrder::Big);

        let image = read_scaled(&path, 1, 2, ByteOrder::Big, PixelScale::default()).unwrap();
        assert_eq!(image[[0, 0]], 0.0);
        assert_abs_diff_eq!(image[[0, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_read_scaled_rejects_wrong_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lst.bsq");
        write_i64(&path, &[1, 2, 3, 4, 5], ByteOrder::Little);

        let result = read_scaled(&path, 2, 3, ByteOrder::Little, PixelScale::default());
        match result {
            Err(ConvertError::ShapeMismatch { expected, actual, .. }) => {
                assert_eq!(expected, 48);
                assert_eq!(actual, 40);
            }
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    fn widen_roundtrip(strategy: WidenStrategy, order: ByteOrder) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("scene.bsq");
        let target = dir.path().join("scene_converted.bsq");

        let shape = RasterShape::new(3, 4, 2);
        let values: Vec<i64> = (0..24).map(|i| (i - 12) * 1_000_003 + i64::from(i % 5 == 0) * (1 << 53)).collect();
        write_i64(&source, &values, order);
        fs::copy(&source, &target).unwrap();

        PixelReinterpreter::new(shape, order)
            .widen(&source, &target, strategy, 0)
            .unwrap();

        let widened = read_f64(&target, order);
        let expected: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        assert_eq!(widened, expected);

        // source untouched
        let source_after = decode_i64(&fs::read(&source).unwrap(), order);
        assert_eq!(source_after, values);
    }

    #[test]
    fn test_widen_mapped_exact_cast() {
        widen_roundtrip(WidenStrategy::MemoryMapped, ByteOrder::Little);
    }

    #[test]
    fn test_widen_buffered_exact_cast() {
        widen_roundtrip(WidenStrategy::Buffered, ByteOrder::Little);
    }

    #[test]
    fn test_widen_foreign_byte_order() {
        widen_roundtrip(WidenStrategy::MemoryMapped, ByteOrder::Big);
        widen_roundtrip(WidenStrategy::Buffered, ByteOrder::Big);
    }

    #[test]
    fn test_widen_auto_exact_cast() {
        widen_roundtrip(WidenStrategy::Auto, ByteOrder::Little);
    }

    #[test]
    fn test_auto_strategy_threshold() {
        let threshold = 1024;
        assert!(!uses_mapping(WidenStrategy::Auto, 1023, threshold));
        assert!(uses_mapping(WidenStrategy::Auto, 1024, threshold));
        assert!(uses_mapping(WidenStrategy::Auto, 4096, threshold));
        assert!(!uses_mapping(WidenStrategy::Buffered, 4096, threshold));
        assert!(uses_mapping(WidenStrategy::MemoryMapped, 8, threshold));
    }

    #[test]
    fn test_widen_shape_mismatch_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("scene.bsq");
        let target = dir.path().join("scene_converted.bsq");

        let values: Vec<i64> = (0..95).collect();
        write_i64(&source, &values, ByteOrder::Little);
        fs::copy(&source, &target).unwrap();
        let before = fs::read(&target).unwrap();

        let reinterpreter = PixelReinterpreter::new(RasterShape::new(10, 10, 1), ByteOrder::Little);
        for strategy in [WidenStrategy::MemoryMapped, WidenStrategy::Buffered] {
            match reinterpreter.widen(&source, &target, strategy, 0) {
                Err(ConvertError::ShapeMismatch { expected, actual, .. }) => {
                    assert_eq!(expected, 800);
                    assert_eq!(actual, 760);
                }
                other => panic!("expected ShapeMismatch, got {:?}", other),
            }
        }
        assert_eq!(fs::read(&target).unwrap(), before);
    }
}

use crate::types::{ByteOrder, ConvertError, ConvertResult, GeoTransform, RasterShape, ENVI_FLOAT64};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Substring identifying the georeferencing record
pub const MAP_INFO_MARKER: &str = "map info =";

/// Substring identifying the pixel data type line, trailing space included
pub const DATA_TYPE_MARKER: &str = "data type = ";

/// Fields recovered from an ENVI sidecar header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnviHeader {
    pub columns: usize,
    pub rows: usize,
    /// `bands` key, 1 when absent
    pub bands: usize,
    pub geo_transform: GeoTransform,
    /// Raw `data type` code, if declared
    pub data_type: Option<u32>,
    pub byte_order: ByteOrder,
    /// Bytes preceding pixel data in the binary file
    pub header_offset: u64,
}

impl EnviHeader {
    pub fn shape(&self) -> RasterShape {
        RasterShape::new(self.rows, self.columns, self.bands)
    }

    /// Pixel data must start at byte 0 of the binary file
    pub fn ensure_no_offset(&self) -> ConvertResult<()> {
        if self.header_offset != 0 {
            return Err(ConvertError::InvalidFormat(format!(
                "header offset of {} bytes is not supported",
                self.header_offset
            )));
        }
        Ok(())
    }
}

/// Path of the `.hdr` sidecar sharing the pixel file's base name
pub fn header_path<P: AsRef<Path>>(raster_path: P) -> PathBuf {
    raster_path.as_ref().with_extension("hdr")
}

/// Read the sidecar header of `raster_path` and return (columns, rows, geotransform)
pub fn read_header_info<P: AsRef<Path>>(raster_path: P) -> ConvertResult<(usize, usize, GeoTransform)> {
    let header = read_envi_header(raster_path)?;
    Ok((header.columns, header.rows, header.geo_transform))
}

/// Read and parse the sidecar header of `raster_path`
pub fn read_envi_header<P: AsRef<Path>>(raster_path: P) -> ConvertResult<EnviHeader> {
    let hdr_path = header_path(raster_path);
    log::debug!("Reading ENVI header: {}", hdr_path.display());

    let bytes = fs::read(&hdr_path).map_err(|e| ConvertError::file_access(&hdr_path, e))?;

    let header = parse_envi_header(&String::from_utf8_lossy(&bytes))?;
    log::debug!(
        "Header geometry: {} samples x {} lines x {} bands, geotransform {:?}",
        header.columns,
        header.rows,
        header.bands,
        header.geo_transform.to_array()
    );
    Ok(header)
}

/// Single pass over the header text; the last line matching a key wins
pub fn parse_envi_header(content: &str) -> ConvertResult<EnviHeader> {
    let mut columns = None;
    let mut rows = None;
    let mut bands = None;
    let mut map_info = None;
    let mut data_type = None;
    let mut byte_order = None;
    let mut header_offset = None;

    for line in content.lines() {
        if line.contains("samples") {
            columns = Some(parse_dimension(line, "samples")?);
        }
        if line.contains("lines") {
            rows = Some(parse_dimension(line, "lines")?);
        }
        let key = key_name(line);
        if key == Some("bands") {
            bands = Some(parse_dimension(line, "bands")?);
        }
        if line.contains(MAP_INFO_MARKER) {
            map_info = Some(parse_map_info(line)?);
        }
        if key == Some("data type") {
            data_type = Some(parse_value::<u32>(line, "data type")?);
        }
        if key == Some("byte order") {
            let code = parse_value::<u32>(line, "byte order")?;
            byte_order = Some(ByteOrder::from_envi_code(code).ok_or_else(|| {
                ConvertError::HeaderParse(format!("unknown byte order code {}", code))
            })?);
        }
        if key == Some("header offset") {
            header_offset = Some(parse_value::<u64>(line, "header offset")?);
        }
    }

    let columns = columns.ok_or_else(|| missing_field("samples"))?;
    let rows = rows.ok_or_else(|| missing_field("lines"))?;
    let (origin_x, origin_y, x_res, y_res) = map_info.ok_or_else(|| missing_field("map info"))?;

    Ok(EnviHeader {
        columns,
        rows,
        bands: bands.unwrap_or(1),
        geo_transform: GeoTransform::north_up(origin_x, origin_y, x_res, y_res),
        data_type,
        byte_order: byte_order.unwrap_or_default(),
        header_offset: header_offset.unwrap_or(0),
    })
}

/// Trimmed text left of the first `=`, None for lines without one
fn key_name(line: &str) -> Option<&str> {
    line.find('=').map(|idx| line[..idx].trim())
}

fn missing_field(key: &str) -> ConvertError {
    ConvertError::HeaderParse(format!("missing required field '{}'", key))
}

/// Value between the first and second `=` of a `key = value` line
fn right_hand_side<'a>(line: &'a str, key: &str) -> ConvertResult<&'a str> {
    line.split('=')
        .nth(1)
        .map(str::trim)
        .ok_or_else(|| ConvertError::HeaderParse(format!("no '=' on '{}' line: {}", key, line.trim())))
}

fn parse_value<T: std::str::FromStr>(line: &str, key: &str) -> ConvertResult<T> {
    let value = right_hand_side(line, key)?;
    value
        .parse::<T>()
        .map_err(|_| ConvertError::HeaderParse(format!("invalid {} value '{}'", key, value)))
}

fn parse_dimension(line: &str, key: &str) -> ConvertResult<usize> {
    let value = parse_value::<usize>(line, key)?;
    if value == 0 {
        return Err(ConvertError::HeaderParse(format!("{} must be positive", key)));
    }
    Ok(value)
}

/// `map info = {proj, ref x, ref y, origin x, origin y, x res, y res, ...}`
fn parse_map_info(line: &str) -> ConvertResult<(f64, f64, f64, f64)> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 7 {
        return Err(ConvertError::HeaderParse(format!(
            "map info has {} fields, at least 7 required",
            fields.len()
        )));
    }

    let field = |idx: usize, name: &str| -> ConvertResult<f64> {
        let raw = fields[idx].trim().trim_end_matches('}').trim();
        raw.parse::<f64>()
            .map_err(|_| ConvertError::HeaderParse(format!("invalid map info {} '{}'", name, raw)))
    };

    Ok((
        field(3, "origin x")?,
        field(4, "origin y")?,
        field(5, "x resolution")?,
        field(6, "y resolution")?,
    ))
}

/// Replace the first `data type = ` line of a header file with `replacement`
///
/// The file is rewritten in full through the same handle; every other line keeps its
/// bytes and position. Returns whether a line was replaced.
pub fn rewrite_data_type_line<P: AsRef<Path>>(hdr_path: P, replacement: &str) -> ConvertResult<bool> {
    let path = hdr_path.as_ref();
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| ConvertError::file_access(path, e))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| ConvertError::file_access(path, e))?;

    let (rewritten, replaced) = replace_data_type_line(&content, replacement);
    if !replaced {
        log::warn!("No '{}' line found in {}", DATA_TYPE_MARKER.trim(), path.display());
    }

    truncate_and_write(&mut file, &rewritten)
        .map_err(|e| ConvertError::file_access(path, e))?;

    Ok(replaced)
}

fn truncate_and_write(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.set_len(0)?;
    file.write_all(bytes)?;
    file.flush()
}

/// Mark a header as holding 64-bit floats
pub fn change_header_dtype<P: AsRef<Path>>(hdr_path: P) -> ConvertResult<bool> {
    rewrite_data_type_line(hdr_path, &format!("data type = {} \n", ENVI_FLOAT64))
}

/// In-memory form of [`rewrite_data_type_line`]
///
/// Works on raw bytes so lines in other encodings are written back unchanged.
pub fn replace_data_type_line(content: &[u8], replacement: &str) -> (Vec<u8>, bool) {
    let marker = DATA_TYPE_MARKER.as_bytes();
    let mut out = Vec::with_capacity(content.len() + replacement.len());
    let mut replaced = false;

    for line in content.split_inclusive(|&b| b == b'\n') {
        if !replaced && line.windows(marker.len()).any(|w| w == marker) {
            out.extend_from_slice(replacement.as_bytes());
            replaced = true;
        } else {
            out.extend_from_slice(line);
        }
    }

    (out, replaced)
}

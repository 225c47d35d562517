use enviconv::io::header::{change_header_dtype, rewrite_data_type_line};
use enviconv::{read_header_info, ConvertError, RasterDuplicator};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SOURCE_HEADER: &str = "ENVI\n\
description = {Land surface temperature, decikelvin}\n\
samples = 3\n\
lines   = 2\n\
bands   = 1\n\
header offset = 0\n\
file type = ENVI Standard\n\
data type = 14\n\
interleave = bsq\n\
byte order = 0\n\
map info = {UTM, 1.000, 1.000, 500000.000, 4200000.000, 30.000, 30.000, 13, North, WGS-84, units=Meters}\n\
band names = {\n\
 LST}\n";

fn write_pair(dir: &Path) -> std::path::PathBuf {
    let raster = dir.join("scene.bsq");
    let pixels: Vec<u8> = [27315i64, 27415, 27515, 0, -100, 30000]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    fs::write(&raster, pixels).unwrap();
    fs::write(dir.join("scene.hdr"), SOURCE_HEADER).unwrap();
    raster
}

#[test]
fn test_duplicate_default_tag() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let source = write_pair(dir.path());

    let target = RasterDuplicator::duplicate(&source, "_converted", "data type = 5 \n")
        .expect("Failed to duplicate raster");

    assert_eq!(target, dir.path().join("scene_converted.bsq"));
    assert_eq!(fs::read(&target).unwrap(), fs::read(&source).unwrap());

    let copied = fs::read_to_string(dir.path().join("scene_converted.hdr")).unwrap();
    let source_lines: Vec<&str> = SOURCE_HEADER.lines().collect();
    let copied_lines: Vec<&str> = copied.lines().collect();
    assert_eq!(source_lines.len(), copied_lines.len());

    for (src, dst) in source_lines.iter().zip(&copied_lines) {
        if src.contains("data type = ") {
            assert_eq!(*dst, "data type = 5 ");
        } else {
            assert_eq!(src, dst);
        }
    }

    // source pair untouched
    assert_eq!(fs::read_to_string(dir.path().join("scene.hdr")).unwrap(), SOURCE_HEADER);
}

#[test]
fn test_duplicate_overwrites_existing_target() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let source = write_pair(dir.path());
    fs::write(dir.path().join("scene_f64.bsq"), b"stale").unwrap();

    let target = RasterDuplicator::duplicate(&source, "_f64", "data type = 5 \n").unwrap();
    assert_eq!(target, dir.path().join("scene_f64.bsq"));
    assert_eq!(fs::read(&target).unwrap().len(), 48);
    assert!(dir.path().join("scene_f64.hdr").exists());
}

#[test]
fn test_duplicate_missing_header() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let source = write_pair(dir.path());
    let header = dir.path().join("scene.hdr");
    fs::remove_file(&header).unwrap();

    match RasterDuplicator::duplicate(&source, "_converted", "data type = 5 \n") {
        Err(ConvertError::FileAccess { path, .. }) => assert_eq!(path, header),
        other => panic!("expected FileAccess error, got {:?}", other),
    }
}

#[test]
fn test_header_mutation_idempotent() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let once = dir.path().join("once.hdr");
    let twice = dir.path().join("twice.hdr");
    fs::write(&once, SOURCE_HEADER).unwrap();
    fs::write(&twice, SOURCE_HEADER).unwrap();

    assert!(change_header_dtype(&once).unwrap());
    assert!(change_header_dtype(&twice).unwrap());
    assert!(change_header_dtype(&twice).unwrap());

    assert_eq!(fs::read(&once).unwrap(), fs::read(&twice).unwrap());
}

#[test]
fn test_header_mutation_shorter_file_is_truncated() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let hdr = dir.path().join("long.hdr");
    fs::write(&hdr, "ENVI\ndata type = 14 with a long trailing comment\nlines = 2\n").unwrap();

    rewrite_data_type_line(&hdr, "data type = 5 \n").unwrap();
    assert_eq!(fs::read_to_string(&hdr).unwrap(), "ENVI\ndata type = 5 \nlines = 2\n");
}

#[test]
fn test_header_mutation_unreadable_path() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let result = change_header_dtype(dir.path().join("absent.hdr"));
    assert!(matches!(result, Err(ConvertError::FileAccess { .. })));
}

#[test]
fn test_latin1_header_parsed_and_preserved() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let source = write_pair(dir.path());

    let mut header = b"ENVI\ndescription = {LST in 0.01 ".to_vec();
    header.push(0xB0); // Latin-1 degree sign
    header.extend_from_slice(b"K}\n");
    header.extend_from_slice(SOURCE_HEADER.trim_start_matches("ENVI\n").as_bytes());
    fs::write(dir.path().join("scene.hdr"), &header).unwrap();

    let (columns, rows, _) = read_header_info(&source).expect("Failed to parse Latin-1 header");
    assert_eq!((columns, rows), (3, 2));

    RasterDuplicator::duplicate(&source, "_converted", "data type = 5 \n").unwrap();
    let copied = fs::read(dir.path().join("scene_converted.hdr")).unwrap();

    let expected: Vec<u8> = header
        .split_inclusive(|&b| b == b'\n')
        .flat_map(|line| {
            if line.starts_with(b"data type = ") {
                b"data type = 5 \n".to_vec()
            } else {
                line.to_vec()
            }
        })
        .collect();
    assert_eq!(copied, expected);
}

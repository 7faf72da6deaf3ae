//! Source loader integration tests: BOM handling across the supported
//! encodings and loader error reporting.

use std::fs;

use sdvidl_base::ErrorKind;
use sdvidl_front::{Environment, Pipeline, Source};

const LOGICAL: &str = "module cabin {\n  const int32 seats = 5;\n};\n";

fn utf8_with_bom() -> Vec<u8> {
    let mut raw = vec![0xEF, 0xBB, 0xBF];
    raw.extend_from_slice(LOGICAL.as_bytes());
    raw
}

fn utf16(big_endian: bool) -> Vec<u8> {
    let mut raw = if big_endian {
        vec![0xFE, 0xFF]
    } else {
        vec![0xFF, 0xFE]
    };
    for unit in LOGICAL.encode_utf16() {
        if big_endian {
            raw.extend_from_slice(&unit.to_be_bytes());
        } else {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
    }
    raw
}

fn utf32(big_endian: bool) -> Vec<u8> {
    let mut raw = if big_endian {
        vec![0x00, 0x00, 0xFE, 0xFF]
    } else {
        vec![0xFF, 0xFE, 0x00, 0x00]
    };
    for ch in LOGICAL.chars() {
        if big_endian {
            raw.extend_from_slice(&(ch as u32).to_be_bytes());
        } else {
            raw.extend_from_slice(&(ch as u32).to_le_bytes());
        }
    }
    raw
}

/// Loading the same logical content in any supported encoding yields
/// byte-identical UTF-8 buffers.
#[test]
fn bom_parity_across_encodings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let variants: [(&str, Vec<u8>); 6] = [
        ("plain.idl", LOGICAL.as_bytes().to_vec()),
        ("utf8.idl", utf8_with_bom()),
        ("utf16le.idl", utf16(false)),
        ("utf16be.idl", utf16(true)),
        ("utf32le.idl", utf32(false)),
        ("utf32be.idl", utf32(true)),
    ];

    for (name, raw) in &variants {
        let path = dir.path().join(name);
        fs::write(&path, raw).unwrap();
        let source = Source::load(&path).expect(name);
        assert_eq!(source.code(), LOGICAL, "{name}");
        assert!(source.path().is_absolute());
    }
}

#[test]
fn bom_encoded_file_lexes_like_plain_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("unit.idl");
    fs::write(&path, utf16(true)).unwrap();

    let mut pipeline = Pipeline::from_file(&path, Environment::new()).unwrap();
    let token = pipeline.next_token().unwrap();
    assert_eq!(token.text(), "module");
    pipeline.lexical_check().unwrap();
}

#[test]
fn unreadable_file_reports_io_error() {
    let err = Source::load("no/such/dir/none.idl").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
}

#[test]
fn invalid_utf16_payload_reports_encoding_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.idl");
    // A lone high surrogate cannot be transcoded.
    fs::write(&path, [0xFF, 0xFE, 0x00, 0xD8]).unwrap();
    let err = Source::load(&path).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Encoding);
}

#[test]
fn literal_source_is_rooted_at_the_working_directory() {
    let source = Source::from_literal("interface I;");
    assert!(source.path().ends_with("unknown.idl"));
    assert_eq!(source.code(), "interface I;");
}

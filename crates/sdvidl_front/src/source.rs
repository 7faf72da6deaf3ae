//! Source file loading with BOM-aware decoding.
//!
//! A [`Source`] owns the absolute path of an IDL file and its content as an
//! immutable UTF-8 buffer. The loader inspects the first bytes of the file
//! for a byte-order mark and transcodes UTF-16/UTF-32 input (either
//! endianness) to UTF-8; files without a BOM are treated as raw 8-bit text.
//!
//! The buffer is reference-counted so that cursors and tokens derived from
//! it remain valid for as long as any of them is alive.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use sdvidl_base::{CompileError, ErrorKind, Location, Result};

/// An IDL source file normalised to UTF-8.
#[derive(Debug, Clone)]
pub struct Source {
    path: PathBuf,
    code: Rc<str>,
}

impl Source {
    /// Reads the file at `path`, detects the BOM and transcodes to UTF-8.
    ///
    /// Fails with `Io` when the file cannot be opened or read and with
    /// `Encoding` when transcoding meets an invalid sequence.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(CompileError::bare(ErrorKind::Io, "file name missing"));
        }

        let absolute = std::path::absolute(path).map_err(|err| {
            CompileError::new(
                ErrorKind::Io,
                format!("cannot resolve path: {err}"),
                Location::file_only(path),
            )
        })?;

        let raw = std::fs::read(&absolute).map_err(|err| {
            CompileError::new(
                ErrorKind::Io,
                format!("cannot open file: {err}"),
                Location::file_only(&absolute),
            )
        })?;

        let code = decode(&raw, &absolute)?;
        Ok(Self {
            path: absolute,
            code: Rc::from(code),
        })
    }

    /// Wraps literal code, bypassing the file system. The path becomes
    /// `<cwd>/unknown.idl`. Intended for tests and `-D` style injections.
    pub fn from_literal(code: &str) -> Self {
        let path = std::env::current_dir()
            .unwrap_or_default()
            .join("unknown.idl");
        Self {
            path,
            code: Rc::from(code),
        }
    }

    /// The absolute path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The UTF-8 code buffer.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Shared handle to the code buffer, used by cursors and tokens.
    pub fn shared_code(&self) -> Rc<str> {
        Rc::clone(&self.code)
    }
}

/// Decodes a raw byte buffer according to its BOM.
fn decode(raw: &[u8], path: &Path) -> Result<String> {
    let encoding_error = |message: String| {
        CompileError::new(ErrorKind::Encoding, message, Location::file_only(path))
    };

    // The UTF-32 LE mark starts with the UTF-16 LE mark, so check the wider
    // marks first.
    if raw.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return std::str::from_utf8(&raw[3..])
            .map(str::to_owned)
            .map_err(|err| encoding_error(format!("invalid UTF-8 sequence: {err}")));
    }
    if raw.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        return decode_utf32(&raw[4..], true).map_err(encoding_error);
    }
    if raw.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return decode_utf32(&raw[4..], false).map_err(encoding_error);
    }
    if raw.starts_with(&[0xFE, 0xFF]) {
        return decode_utf16(&raw[2..], true).map_err(encoding_error);
    }
    if raw.starts_with(&[0xFF, 0xFE]) {
        return decode_utf16(&raw[2..], false).map_err(encoding_error);
    }

    // No BOM: raw 8-bit text. Well-formed UTF-8 passes through unchanged,
    // anything else is read as Latin-1.
    match std::str::from_utf8(raw) {
        Ok(text) => Ok(text.to_owned()),
        Err(_) => Ok(raw.iter().map(|&b| b as char).collect()),
    }
}

fn decode_utf16(payload: &[u8], big_endian: bool) -> std::result::Result<String, String> {
    if payload.len() % 2 != 0 {
        return Err("truncated UTF-16 code unit".to_owned());
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| {
            let bytes = [pair[0], pair[1]];
            if big_endian {
                u16::from_be_bytes(bytes)
            } else {
                u16::from_le_bytes(bytes)
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| "invalid UTF-16 surrogate sequence".to_owned())
}

fn decode_utf32(payload: &[u8], big_endian: bool) -> std::result::Result<String, String> {
    if payload.len() % 4 != 0 {
        return Err("truncated UTF-32 code unit".to_owned());
    }
    payload
        .chunks_exact(4)
        .map(|quad| {
            let bytes = [quad[0], quad[1], quad[2], quad[3]];
            let unit = if big_endian {
                u32::from_be_bytes(bytes)
            } else {
                u32::from_le_bytes(bytes)
            };
            char::from_u32(unit).ok_or_else(|| format!("invalid UTF-32 code point 0x{unit:08X}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_source_uses_unknown_path() {
        let source = Source::from_literal("module m {};");
        assert_eq!(source.code(), "module m {};");
        assert!(source.path().ends_with("unknown.idl"));
        assert!(source.path().is_absolute());
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut raw = vec![0xEF, 0xBB, 0xBF];
        raw.extend_from_slice("const".as_bytes());
        assert_eq!(decode(&raw, Path::new("x.idl")).unwrap(), "const");
    }

    #[test]
    fn utf16_both_endiannesses_decode_identically() {
        let text = "interface Tür;";
        let mut le = vec![0xFF, 0xFE];
        let mut be = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode(&le, Path::new("x.idl")).unwrap(), text);
        assert_eq!(decode(&be, Path::new("x.idl")).unwrap(), text);
    }

    #[test]
    fn utf32_both_endiannesses_decode_identically() {
        let text = "wstring w;";
        let mut le = vec![0xFF, 0xFE, 0x00, 0x00];
        let mut be = vec![0x00, 0x00, 0xFE, 0xFF];
        for ch in text.chars() {
            le.extend_from_slice(&(ch as u32).to_le_bytes());
            be.extend_from_slice(&(ch as u32).to_be_bytes());
        }
        assert_eq!(decode(&le, Path::new("x.idl")).unwrap(), text);
        assert_eq!(decode(&be, Path::new("x.idl")).unwrap(), text);
    }

    #[test]
    fn invalid_utf16_surrogate_is_an_encoding_error() {
        // Lone high surrogate.
        let raw = vec![0xFF, 0xFE, 0x00, 0xD8];
        assert!(decode(&raw, Path::new("x.idl")).is_err());
    }

    #[test]
    fn truncated_utf32_unit_is_an_encoding_error() {
        let raw = vec![0xFF, 0xFE, 0x00, 0x00, 0x41, 0x00];
        assert!(decode(&raw, Path::new("x.idl")).is_err());
    }

    #[test]
    fn no_bom_reads_as_raw_bytes() {
        let raw = b"octet o; \xE9".to_vec();
        let text = decode(&raw, Path::new("x.idl")).unwrap();
        assert!(text.starts_with("octet o; "));
        assert_eq!(text.chars().last(), Some('\u{e9}'));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Source::load("definitely/not/here.idl").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }
}

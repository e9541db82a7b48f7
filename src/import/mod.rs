//! Source-document loading.
//!
//! NIMAS DTBook files and loose XHTML documents are read as plain XML;
//! `.epub` archives are unpacked and their spine stitched into one XHTML
//! tree (see [`epub`]).

pub mod epub;

use std::io::Cursor;
use std::path::Path;

use crate::dom::{parse_bytes, Dom};
use crate::error::Result;

pub use epub::{read_epub, read_epub_from_reader};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Load a source document from disk.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Dom> {
    let path = path.as_ref();
    let is_epub = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"));
    if is_epub {
        return read_epub(path);
    }
    load_bytes(&std::fs::read(path)?)
}

/// Load a source document from memory, recognizing zipped EPUBs by their magic bytes.
pub fn load_bytes(bytes: &[u8]) -> Result<Dom> {
    if bytes.starts_with(ZIP_MAGIC) {
        return read_epub_from_reader(Cursor::new(bytes));
    }
    parse_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_plain_xml() {
        let dom = load_bytes(b"<dtbook><book/></dtbook>").unwrap();
        assert!(dom.document_element().is_some());
    }

    #[test]
    fn test_zip_magic_without_epub_fails() {
        assert!(load_bytes(b"PK\x03\x04garbage").is_err());
    }
}

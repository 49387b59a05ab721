use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("malformed attribute at byte {position}: {source}")]
    Attribute {
        position: u64,
        #[source]
        source: quick_xml::events::attributes::AttrError,
    },
    #[error("invalid UTF-8 in CDATA section at byte {position}")]
    Utf8 { position: u64 },
    #[error("input ended inside an unclosed <page> element")]
    UnclosedRecord,
}

/// A single artifact that could not be written. Re-running the write for the
/// same path is always safe since artifacts are overwritten.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct PersistError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

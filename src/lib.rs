//! scoregraph: structural import of score documents into an in-memory
//! score graph.
//!
//! A score document is a tree of sheets, contexts (staves, lyrics,
//! figured bass, function marks, chord names), voices and music elements.
//! Importing rebuilds the cross references the markup only implies: signs
//! shared between the voices of a staff, ties and slurs, tuplet timing,
//! and lyrics bound to voices declared later in the sheet.
//!
//! # Example
//! ```no_run
//! use scoregraph::import_file;
//!
//! let doc = import_file("path/to/score.can").unwrap();
//! println!("Title: {}", doc.title);
//! println!("Sheets: {}", doc.sheets.len());
//! println!("Voices: {}", doc.voice_count());
//! ```

pub mod error;
pub mod import;
pub mod model;
pub mod tokenizer;
pub mod version;

use std::io::Read;
use std::path::Path;

pub use error::{ImportError, Result};
pub use import::{ImportOptions, ResourceController, ScoreBuilder, VoiceRepair};
pub use model::*;
pub use version::{Version, VersionGate};

/// Import a score document from a string with default options.
pub fn import_str(xml: &str) -> Result<Document> {
    import_with_options(xml, ImportOptions::default())
}

/// Import a score document from a string.
pub fn import_with_options(xml: &str, options: ImportOptions) -> Result<Document> {
    ScoreBuilder::new(options).build(xml)
}

/// Import a score document from raw bytes, which must be UTF-8.
pub fn import_bytes(data: &[u8]) -> Result<Document> {
    let xml = std::str::from_utf8(data).map_err(|e| ImportError::Syntax {
        line: 0,
        column: 0,
        message: format!("invalid UTF-8 in score document: {e}"),
    })?;
    import_str(xml)
}

/// Import a score document from any reader.
pub fn import_reader<R: Read>(mut reader: R) -> Result<Document> {
    let mut xml = String::new();
    reader.read_to_string(&mut xml).map_err(|e| ImportError::Io {
        path: "<reader>".to_string(),
        message: e.to_string(),
    })?;
    import_str(&xml)
}

/// Import a score document from a file path. Embedded resources are
/// resolved relative to the file's directory.
pub fn import_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    import_with_options(
        &xml,
        ImportOptions {
            source_path: Some(path.to_path_buf()),
            ..ImportOptions::default()
        },
    )
}

/// Convert an imported document to a JSON string.
/// Useful for debugging and for passing data across FFI boundaries.
pub fn document_to_json(document: &Document) -> std::result::Result<String, String> {
    serde_json::to_string_pretty(document).map_err(|e| format!("JSON serialization error: {e}"))
}

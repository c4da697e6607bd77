//! Reading `.sff` files (JSON) from disk or stdin.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde_json::Value;

use crate::sff::SffDocument;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a file (or stdin for `-`) into the raw JSON value.
pub fn read_sff_value(path: &str) -> Result<Value, ReadError> {
    let text = if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|source| ReadError::Io {
                path: path.to_string(),
                source,
            })?;
        buf
    } else {
        fs::read_to_string(Path::new(path)).map_err(|source| ReadError::Io {
            path: path.to_string(),
            source,
        })?
    };

    serde_json::from_str(&text).map_err(|source| ReadError::Json {
        path: path.to_string(),
        source,
    })
}

/// Deserialize a structurally validated raw value into the typed document.
pub fn document_from_value(path: &str, value: &Value) -> Result<SffDocument, ReadError> {
    serde_json::from_value(value.clone()).map_err(|source| ReadError::Json {
        path: path.to_string(),
        source,
    })
}

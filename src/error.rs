use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading OSM XML data.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying read/write/close failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the XML layer, with the position it happened at
    #[error("XML parsing error at line {line}, column {column}: {message}")]
    Xml {
        line: u64,
        column: u64,
        message: String,
    },

    /// The root element carries no `version` attribute
    #[error("can not read file without version (missing version attribute on osm element)")]
    MissingFormatVersion,

    /// The root element carries a `version` other than 0.6
    #[error("can not read file with version {version}")]
    UnsupportedFormatVersion { version: String },

    /// A required attribute is missing or an attribute value is malformed
    #[error("{0}")]
    Structure(String),

    /// The requested compression codec is not registered
    #[error("support for compression '{0}' is not available")]
    UnsupportedCompression(String),
}

impl Error {
    pub(crate) fn xml(line: u64, column: u64, message: impl Into<String>) -> Self {
        Error::Xml {
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn structure(message: impl Into<String>) -> Self {
        Error::Structure(message.into())
    }
}

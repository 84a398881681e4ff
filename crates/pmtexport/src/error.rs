use pmtexport_core::error::RecordMappingError;

use crate::target::StoreError;
use crate::upsert::UpsertError;

pub const USAGE: &str = "Usage:

    pmtexport export \\
        --pmt projects/pmt.json \\
        --target pmt_metadata.sqlite \\
        --json pmt_metadata.json";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Missing required configuration: {}\n\n{}", .0.join(", "), USAGE)]
    Configuration(Vec<&'static str>),

    #[error("Invalid configuration file {path}: {reason}")]
    ConfigFile { path: String, reason: String },

    #[error("Unable to open {store} store {location}: {reason}")]
    StoreConnect {
        store: &'static str,
        location: String,
        reason: String,
    },

    #[error("Target store query failed")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mapping(#[from] RecordMappingError),

    #[error(transparent)]
    Upsert(#[from] UpsertError),

    #[error("Unable to write JSON export")]
    ExportWrite(#[source] std::io::Error),
}

impl Error {
    /// Errors that end the whole run rather than a single record.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Mapping(_) | Error::Upsert(_))
    }
}

/// Render an error followed by every cause in its chain.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmtexport_core::error::RichTextDecodeError;

    #[test]
    fn test_configuration_error_lists_missing_values_and_usage() {
        let err = Error::Configuration(vec!["--pmt", "--json"]);
        let message = err.to_string();

        assert!(message.starts_with("Missing required configuration: --pmt, --json"));
        assert!(message.contains("pmtexport export"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_record_errors_are_not_fatal() {
        let err = Error::Mapping(RecordMappingError::MissingIdentifier);
        assert!(!err.is_fatal());

        let err = Error::ExportWrite(std::io::Error::other("disk full"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_chain_includes_causes() {
        let err = Error::Mapping(RecordMappingError::RichText {
            id: "P1".to_string(),
            field: "Details".to_string(),
            source: RichTextDecodeError::NoParts,
        });

        assert_eq!(
            error_chain(&err),
            "Record P1: rich text field 'Details' could not be decoded: Multipart body has no parts"
        );
    }
}

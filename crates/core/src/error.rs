//! Error types for the transformation pipeline.

/// A rich-text item whose structure cannot be decoded.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RichTextDecodeError {
    #[error("Invalid composite rich text: {0}")]
    Composite(String),

    #[error("Heading level {0} is outside 1..=6")]
    HeadingLevel(u8),

    #[error("Missing blank line between MIME headers and body")]
    MissingSeparator,

    #[error("Malformed MIME header line: {0}")]
    MalformedHeader(String),

    #[error("Multipart content type '{0}' has no boundary parameter")]
    MissingBoundary(String),

    #[error("Multipart body has no opening delimiter for boundary '{0}'")]
    MissingOpeningDelimiter(String),

    #[error("Multipart body is not terminated by '--{0}--'")]
    Unterminated(String),

    #[error("Multipart body has no parts")]
    NoParts,

    #[error("Invalid base64 content: {0}")]
    Base64(String),
}

/// A source record that could not be mapped into a normalized record.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordMappingError {
    #[error("Source record has no stable identifier")]
    MissingIdentifier,

    #[error("Record {id}: rich text field '{field}' could not be decoded")]
    RichText {
        id: String,
        field: String,
        #[source]
        source: RichTextDecodeError,
    },
}

impl RecordMappingError {
    /// Identifier of the source record that failed, if it had one.
    pub fn id(&self) -> Option<&str> {
        match self {
            RecordMappingError::MissingIdentifier => None,
            RecordMappingError::RichText { id, .. } => Some(id.as_str()),
        }
    }
}

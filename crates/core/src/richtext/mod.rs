//! Rich-text normalization.
//!
//! Legacy documents store rich text in one of two encodings:
//!
//! - **Composite**: a structured node tree that must be rendered to markup
//!   before any text can be extracted ([`composite`]).
//! - **MultiPart**: an already encoded MIME entity whose `text/html` part
//!   (or sole part) carries the renderable content ([`mime`]).
//!
//! [`normalize`] turns either one into a [`NormalizedText`]: a plain-text
//! projection plus a portable [`MultiPartBody`]. The text is always
//! extracted from the body's own renderable content, so the two can never
//! disagree.

pub mod composite;
pub mod mime;

use crate::error::RichTextDecodeError;
use crate::html::html_to_text;

pub use composite::{CompositeDocument, CompositeNode, Mark};
pub use mime::{ContentType, MimeHeader, MimePart, MultiPartBody};

/// A rich-text item as found on a source document.
#[derive(Debug, Clone, PartialEq)]
pub enum RichTextField {
    /// Raw composite document, decoded during normalization.
    Composite(serde_json::Value),
    /// Raw MIME entity text.
    MultiPart(String),
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    pub text: String,
    pub body: MultiPartBody,
}

/// Normalize a rich-text field into plain text and a portable body.
pub fn normalize(field: &RichTextField) -> Result<NormalizedText, RichTextDecodeError> {
    let body = match field {
        RichTextField::Composite(raw) => composite_body(raw)?,
        RichTextField::MultiPart(raw) => multipart_body(raw)?,
    };
    let text = html_to_text(&body.renderable_content()?);

    Ok(NormalizedText { text, body })
}

fn composite_body(raw: &serde_json::Value) -> Result<MultiPartBody, RichTextDecodeError> {
    let document = CompositeDocument::decode(raw)?;
    Ok(MultiPartBody::from_html(&document.render_html()))
}

fn multipart_body(raw: &str) -> Result<MultiPartBody, RichTextDecodeError> {
    let body = MultiPartBody::parse(raw)?;
    if body.is_multipart() {
        log::debug!(
            "Rich text has {} mime parts, using the {} part",
            body.part_count(),
            body.selected_part().content_type().media_type
        );
    }
    Ok(body)
}

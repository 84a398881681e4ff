//! Multi-part (MIME) bodies: parsing, part selection and content decoding.

use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::RichTextDecodeError;

static PARAM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i);\s*([a-z0-9_.*-]+)\s*=\s*(?:"([^"]*)"|([^;\s]+))"#)
        .expect("content-type parameter pattern is valid")
});

/// A single MIME header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeHeader {
    pub name: String,
    pub value: String,
}

/// Parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`.
    pub media_type: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    pub fn parse(value: &str) -> Self {
        let media_type = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let params = PARAM_REGEX
            .captures_iter(value)
            .map(|caps| {
                let name = caps[1].to_ascii_lowercase();
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                (name, value)
            })
            .collect();

        Self { media_type, params }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }

    pub fn is_html(&self) -> bool {
        self.media_type == "text/html"
    }
}

impl Default for ContentType {
    /// RFC 2045 default for parts without a `Content-Type` header.
    fn default() -> Self {
        Self::parse("text/plain; charset=us-ascii")
    }
}

/// One entity of a MIME tree: headers, raw body and, for multipart
/// entities, the parsed child parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    headers: Vec<MimeHeader>,
    body: String,
    parts: Vec<MimePart>,
}

impl MimePart {
    /// Parse a top-level entity; the header/body separator is mandatory.
    fn parse(raw: &str) -> Result<Self, RichTextDecodeError> {
        let (head, body) = split_head_body(raw).ok_or(RichTextDecodeError::MissingSeparator)?;
        Self::from_head_body(head, body)
    }

    /// Parse a body part. Headers running up to the next delimiter leave an
    /// empty body.
    fn parse_nested(raw: &str) -> Result<Self, RichTextDecodeError> {
        let (head, body) = split_head_body(raw).unwrap_or((raw, ""));
        Self::from_head_body(head, body)
    }

    fn from_head_body(head: &str, body: &str) -> Result<Self, RichTextDecodeError> {
        let headers = parse_headers(head)?;
        let mut part = Self {
            headers,
            body: body.to_string(),
            parts: Vec::new(),
        };

        let content_type = part.content_type();
        if content_type.is_multipart() {
            let boundary = content_type
                .param("boundary")
                .ok_or_else(|| RichTextDecodeError::MissingBoundary(content_type.media_type.clone()))?;
            part.parts = split_multipart(body, boundary)?
                .into_iter()
                .map(MimePart::parse_nested)
                .collect::<Result<Vec<_>, _>>()?;
        }

        Ok(part)
    }

    pub fn headers(&self) -> &[MimeHeader] {
        &self.headers
    }

    /// Case-insensitive header lookup (first occurrence wins).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn content_type(&self) -> ContentType {
        self.header("Content-Type")
            .map(ContentType::parse)
            .unwrap_or_default()
    }

    /// Child parts; empty for leaf entities.
    pub fn parts(&self) -> &[MimePart] {
        &self.parts
    }

    /// Body exactly as it appears in the source, still transfer-encoded.
    pub fn raw_body(&self) -> &str {
        &self.body
    }

    /// The renderable leaf of this entity: itself for a leaf, otherwise the
    /// first `text/html` child, falling back to the first child, applied
    /// again inside nested multiparts.
    pub fn selected_part(&self) -> &MimePart {
        match self.parts.first() {
            None => self,
            Some(first) => self
                .parts
                .iter()
                .find(|part| part.content_type().is_html())
                .unwrap_or(first)
                .selected_part(),
        }
    }

    /// Body with the transfer encoding and charset undone.
    ///
    /// Multipart entities decode their [`MimePart::selected_part`], never
    /// their framing.
    pub fn text_content(&self) -> Result<String, RichTextDecodeError> {
        if !self.parts.is_empty() {
            return self.selected_part().text_content();
        }

        let content_type = self.content_type();

        let encoding = self
            .header("Content-Transfer-Encoding")
            .map(|e| e.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let bytes = match encoding.as_str() {
            "base64" => decode_base64(&self.body)?,
            "quoted-printable" => decode_quoted_printable(&self.body),
            _ => self.body.as_bytes().to_vec(),
        };

        Ok(decode_charset(&bytes, content_type.param("charset")))
    }
}

/// Portable multi-part body: the exact MIME text plus its parsed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPartBody {
    raw: String,
    root: MimePart,
}

impl MultiPartBody {
    /// Parse an existing MIME entity, keeping its text as-is.
    pub fn parse(raw: &str) -> Result<Self, RichTextDecodeError> {
        let root = MimePart::parse(raw)?;
        Ok(Self {
            raw: raw.to_string(),
            root,
        })
    }

    /// Wrap an HTML fragment as a single `text/html` entity.
    pub fn from_html(markup: &str) -> Self {
        let encoding = if markup.is_ascii() { "7bit" } else { "8bit" };
        let headers = vec![
            MimeHeader {
                name: "MIME-Version".to_string(),
                value: "1.0".to_string(),
            },
            MimeHeader {
                name: "Content-Type".to_string(),
                value: "text/html; charset=UTF-8".to_string(),
            },
            MimeHeader {
                name: "Content-Transfer-Encoding".to_string(),
                value: encoding.to_string(),
            },
        ];

        let mut raw = String::new();
        for header in &headers {
            raw.push_str(&format!("{}: {}\r\n", header.name, header.value));
        }
        raw.push_str("\r\n");
        raw.push_str(markup);

        Self {
            raw,
            root: MimePart {
                headers,
                body: markup.to_string(),
                parts: Vec::new(),
            },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn root(&self) -> &MimePart {
        &self.root
    }

    pub fn is_multipart(&self) -> bool {
        !self.root.parts.is_empty()
    }

    /// Number of top-level parts (1 for a single-part body).
    pub fn part_count(&self) -> usize {
        self.root.parts.len().max(1)
    }

    /// The authoritative renderable part.
    ///
    /// For multipart bodies the first `text/html` part wins and the first
    /// part is the fallback, recursively when that part is itself a
    /// multipart; a single-part body is its own content.
    pub fn selected_part(&self) -> &MimePart {
        self.root.selected_part()
    }

    /// Decoded content of [`MultiPartBody::selected_part`].
    pub fn renderable_content(&self) -> Result<String, RichTextDecodeError> {
        self.selected_part().text_content()
    }
}

impl Serialize for MultiPartBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Split an entity at the first empty line, `None` when there is none.
fn split_head_body(raw: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']).is_empty() {
            return Some((&raw[..offset], &raw[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse a header block, unfolding continuation lines.
fn parse_headers(head: &str) -> Result<Vec<MimeHeader>, RichTextDecodeError> {
    let mut headers: Vec<MimeHeader> = Vec::new();

    for line in head.lines() {
        if line.starts_with([' ', '\t']) {
            match headers.last_mut() {
                Some(last) => {
                    last.value.push(' ');
                    last.value.push_str(line.trim());
                }
                None => return Err(RichTextDecodeError::MalformedHeader(line.to_string())),
            }
            continue;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| RichTextDecodeError::MalformedHeader(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RichTextDecodeError::MalformedHeader(line.to_string()));
        }

        headers.push(MimeHeader {
            name: name.to_string(),
            value: value.trim().to_string(),
        });
    }

    Ok(headers)
}

/// Split a multipart body into the raw text of each part.
///
/// The line break that precedes a delimiter belongs to the delimiter, not
/// to the part. Preamble and epilogue are ignored.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Result<Vec<&'a str>, RichTextDecodeError> {
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut closed = false;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_end();
        let is_close = trimmed == close;
        if is_close || trimmed == open {
            if let Some(start) = current {
                parts.push(strip_trailing_newline(&body[start..offset]));
            }
            if is_close {
                closed = true;
                break;
            }
            current = Some(offset + line.len());
        }
        offset += line.len();
    }

    if current.is_none() {
        return Err(RichTextDecodeError::MissingOpeningDelimiter(boundary.to_string()));
    }
    if !closed {
        return Err(RichTextDecodeError::Unterminated(boundary.to_string()));
    }
    if parts.is_empty() {
        return Err(RichTextDecodeError::NoParts);
    }

    Ok(parts)
}

fn strip_trailing_newline(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
}

// ============================================================================
// Content decoding helpers
// ============================================================================

fn decode_base64(body: &str) -> Result<Vec<u8>, RichTextDecodeError> {
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| RichTextDecodeError::Base64(e.to_string()))
}

/// Quoted-printable decoding. Invalid escapes are kept literally.
fn decode_quoted_printable(body: &str) -> Vec<u8> {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        if bytes[i + 1..].starts_with(b"\r\n") {
            i += 3;
            continue;
        }
        if bytes[i + 1..].starts_with(b"\n") {
            i += 2;
            continue;
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match hex {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

/// Decode with the declared charset; unknown or missing labels read as
/// UTF-8 with replacement characters.
fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| encoding_rs::Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

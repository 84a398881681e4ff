//! Typed access to legacy source documents.
//!
//! A source document is a bag of named, typed items plus a few
//! store-managed properties (identifier, creation and modification times).
//! [`SourceRecord`] is the read-only view the mapper consumes; stores hand
//! out their own document handles as long as they implement it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::richtext::RichTextField;

/// Item marking a document as an unresolved replication/save conflict.
pub const CONFLICT_ITEM: &str = "$Conflict";

/// Discriminator item selecting the record kind.
pub const FORM_ITEM: &str = "Form";

/// Display name item; records without one are skipped.
pub const DISPLAY_NAME_ITEM: &str = "ProjectName";

/// Value of a single document item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ItemValue {
    Text(String),
    TextList(Vec<String>),
    Number(f64),
    DateTime(DateTime<Utc>),
    /// Composite rich text, kept undecoded.
    Composite(serde_json::Value),
    /// MIME rich text, kept undecoded.
    Mime(String),
}

impl ItemValue {
    /// Text rendering of the item; multiple values are joined by a space.
    pub fn as_text(&self) -> String {
        match self {
            ItemValue::Text(text) => text.clone(),
            ItemValue::TextList(values) => values.join(" "),
            ItemValue::Number(number) => format_number(*number),
            ItemValue::DateTime(dt) => dt.to_rfc3339(),
            ItemValue::Composite(_) | ItemValue::Mime(_) => String::new(),
        }
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.is_finite() {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Read-only view over one source document.
pub trait SourceRecord {
    /// Store-assigned stable identifier.
    fn unid(&self) -> &str;

    fn created(&self) -> DateTime<Utc>;

    fn last_modified(&self) -> DateTime<Utc>;

    /// Raw item lookup. Item names are case-insensitive.
    fn item(&self, name: &str) -> Option<&ItemValue>;

    fn has_item(&self, name: &str) -> bool {
        self.item(name).is_some()
    }

    fn is_conflict(&self) -> bool {
        self.has_item(CONFLICT_ITEM)
    }

    /// Item as text, empty when absent.
    fn text(&self, name: &str) -> String {
        self.item(name).map(ItemValue::as_text).unwrap_or_default()
    }

    /// Item as an integer, `default` when absent or not numeric.
    fn int(&self, name: &str, default: i64) -> i64 {
        match self.item(name) {
            Some(ItemValue::Number(number)) if number.is_finite() => number.trunc() as i64,
            Some(ItemValue::Text(text)) => text.trim().parse().unwrap_or(default),
            Some(ItemValue::TextList(values)) => values
                .first()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default),
            _ => default,
        }
    }

    /// Item as a list of strings, empty when absent.
    fn text_list(&self, name: &str) -> Vec<String> {
        match self.item(name) {
            Some(ItemValue::TextList(values)) => values.clone(),
            Some(ItemValue::Composite(_)) | Some(ItemValue::Mime(_)) | None => Vec::new(),
            Some(other) => vec![other.as_text()],
        }
    }

    /// Item as a timestamp, `default` when absent or not a date.
    fn date_time(&self, name: &str, default: DateTime<Utc>) -> DateTime<Utc> {
        match self.item(name) {
            Some(ItemValue::DateTime(dt)) => *dt,
            Some(ItemValue::Text(text)) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(default),
            _ => default,
        }
    }

    /// Rich-text item, `None` when absent or stored as plain data.
    fn rich_text(&self, name: &str) -> Option<RichTextField> {
        match self.item(name)? {
            ItemValue::Composite(raw) => Some(RichTextField::Composite(raw.clone())),
            ItemValue::Mime(raw) => Some(RichTextField::MultiPart(raw.clone())),
            _ => None,
        }
    }
}

/// Owned source document, as loaded from a document dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub unid: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub items: BTreeMap<String, ItemValue>,
}

impl SourceDocument {
    pub fn new(unid: impl Into<String>, created: DateTime<Utc>, last_modified: DateTime<Utc>) -> Self {
        Self {
            unid: unid.into(),
            created,
            last_modified,
            items: BTreeMap::new(),
        }
    }

    pub fn with_item(mut self, name: impl Into<String>, value: ItemValue) -> Self {
        self.items.insert(name.into(), value);
        self
    }
}

impl SourceRecord for SourceDocument {
    fn unid(&self) -> &str {
        &self.unid
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    fn item(&self, name: &str) -> Option<&ItemValue> {
        self.items.get(name).or_else(|| {
            self.items
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }
}

//! Normalized records and the target document shape.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::richtext::MultiPartBody;
use crate::source::ItemValue;

/// Values exported as `true` for boolean-like release fields.
pub const TRUE_VALUES: &[&str] = &["y", "Y", "yes", "Yes", "true", "True"];

/// The two record kinds carried by the legacy store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Project,
    Release,
}

impl RecordKind {
    /// Form tag written on target documents.
    pub fn form(self) -> &'static str {
        match self {
            RecordKind::Project => "project",
            RecordKind::Release => "release",
        }
    }

    /// Select the kind from a discriminator value. Anything that is not
    /// `project` (in any case) is a release.
    pub fn from_form(form: &str) -> Self {
        if form.trim().eq_ignore_ascii_case("project") {
            RecordKind::Project
        } else {
            RecordKind::Release
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.form())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub overview: String,
    pub details_text: String,
    pub details_body: Option<MultiPartBody>,
    pub downloads: i64,
    pub category: String,
    pub chefs: Vec<String>,
    pub cooks: Vec<String>,
    pub created: DateTime<Utc>,
    pub latest_release_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub source_control_url: String,
    pub source_url: String,
    pub source_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    pub id: String,
    pub project_name: String,
    pub version: String,
    pub release_date: DateTime<Utc>,
    pub description_text: String,
    pub description_body: Option<MultiPartBody>,
    pub downloads: i64,
    pub main_id: String,
    #[serde(serialize_with = "serialize_flag")]
    pub release_status: String,
    #[serde(serialize_with = "serialize_flag")]
    pub released: String,
    pub chef: String,
    pub master_chefs: Vec<String>,
    pub license_type: String,
    pub source_url: String,
    pub source_path: String,
}

/// Export a legacy yes/no text value as a JSON boolean.
fn serialize_flag<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(is_true_value(value))
}

pub fn is_true_value(value: &str) -> bool {
    TRUE_VALUES.contains(&value.trim())
}

/// Output of the field mapper.
///
/// Serializes as the bare variant object; the kind is carried by the
/// JSON array the record is written into.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedRecord {
    Project(ProjectRecord),
    Release(ReleaseRecord),
}

impl NormalizedRecord {
    pub fn id(&self) -> &str {
        match self {
            NormalizedRecord::Project(p) => &p.id,
            NormalizedRecord::Release(r) => &r.id,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            NormalizedRecord::Project(_) => RecordKind::Project,
            NormalizedRecord::Release(_) => RecordKind::Release,
        }
    }

    /// Build the document written to the target store.
    pub fn to_target_document(&self) -> TargetDocument {
        let mut doc = TargetDocument::new(self.kind());
        doc.push("sourceUnid", ItemValue::Text(self.id().to_string()));

        match self {
            NormalizedRecord::Project(p) => {
                doc.push("sourcePath", text(&p.source_path));
                doc.push("sourceUrl", text(&p.source_url));
                doc.push("id", text(&p.id));
                doc.push("name", text(&p.name));
                doc.push("overview", text(&p.overview));
                doc.push("detailsText", text(&p.details_text));
                doc.push_body("detailsBody", p.details_body.as_ref());
                doc.push("downloads", ItemValue::Number(p.downloads as f64));
                doc.push("category", text(&p.category));
                doc.push("chefs", ItemValue::TextList(p.chefs.clone()));
                doc.push("cooks", ItemValue::TextList(p.cooks.clone()));
                doc.push("created", ItemValue::DateTime(p.created));
                doc.push("latestReleaseDate", ItemValue::DateTime(p.latest_release_date));
                doc.push("lastModified", ItemValue::DateTime(p.last_modified));
                doc.push("sourceControlUrl", text(&p.source_control_url));
            }
            NormalizedRecord::Release(r) => {
                doc.push("sourcePath", text(&r.source_path));
                doc.push("sourceUrl", text(&r.source_url));
                doc.push("id", text(&r.id));
                doc.push("projectName", text(&r.project_name));
                doc.push("version", text(&r.version));
                doc.push("releaseDate", ItemValue::DateTime(r.release_date));
                doc.push("descriptionText", text(&r.description_text));
                doc.push_body("descriptionBody", r.description_body.as_ref());
                doc.push("downloads", ItemValue::Number(r.downloads as f64));
                doc.push("mainId", text(&r.main_id));
                doc.push("releaseStatus", text(&r.release_status));
                doc.push("released", text(&r.released));
                doc.push("chef", text(&r.chef));
                doc.push("masterChefs", ItemValue::TextList(r.master_chefs.clone()));
                doc.push("licenseType", text(&r.license_type));
            }
        }

        doc
    }
}

fn text(value: &str) -> ItemValue {
    ItemValue::Text(value.to_string())
}

/// Store-agnostic document written to the target store.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDocument {
    pub kind: RecordKind,
    pub items: Vec<(String, ItemValue)>,
}

impl TargetDocument {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            items: vec![("Form".to_string(), ItemValue::Text(kind.form().to_string()))],
        }
    }

    /// Set an item, replacing any previous value with the same name.
    pub fn push(&mut self, name: &str, value: ItemValue) {
        match self.items.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some((_, existing)) => *existing = value,
            None => self.items.push((name.to_string(), value)),
        }
    }

    fn push_body(&mut self, name: &str, body: Option<&MultiPartBody>) {
        if let Some(body) = body {
            self.push(name, ItemValue::Mime(body.as_str().to_string()));
        }
    }

    pub fn item(&self, name: &str) -> Option<&ItemValue> {
        self.items
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// The join key shared with the source store.
    pub fn id(&self) -> Option<&str> {
        match self.item("id") {
            Some(ItemValue::Text(id)) => Some(id.as_str()),
            _ => None,
        }
    }
}

//! Source document store backed by a JSON document dump.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use pmtexport_core::source::{SourceDocument, SourceRecord};
use serde::Deserialize;

use crate::error::Error;

/// Read access to a legacy document store.
pub trait SourceStore {
    type Record: SourceRecord;

    fn title(&self) -> &str;

    /// Reference path of the store, recorded on every exported record.
    fn path(&self) -> &str;

    /// Documents of a named view in view order, `None` when the view does
    /// not exist.
    fn view(&self, name: &str) -> Option<Vec<&Self::Record>>;
}

/// On-disk layout of a document dump.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceDump {
    #[serde(default)]
    title: String,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    views: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    documents: Vec<SourceDocument>,
}

/// In-memory source store loaded from a JSON dump.
#[derive(Debug)]
pub struct JsonSourceStore {
    title: String,
    path: String,
    views: BTreeMap<String, Vec<String>>,
    documents: Vec<SourceDocument>,
    by_unid: HashMap<String, usize>,
}

impl JsonSourceStore {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let connect_error = |reason: String| Error::StoreConnect {
            store: "source",
            location: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| connect_error(e.to_string()))?;
        let dump: SourceDump =
            serde_json::from_str(&content).map_err(|e| connect_error(e.to_string()))?;

        let store = Self::from_dump(dump, path.display().to_string());
        log::info!("Connected to source database: {}", store.title);
        Ok(store)
    }

    pub fn from_json(content: &str, default_path: &str) -> Result<Self, serde_json::Error> {
        let dump: SourceDump = serde_json::from_str(content)?;
        Ok(Self::from_dump(dump, default_path.to_string()))
    }

    fn from_dump(dump: SourceDump, default_path: String) -> Self {
        let by_unid = dump
            .documents
            .iter()
            .enumerate()
            .map(|(index, doc)| (doc.unid.clone(), index))
            .collect();

        Self {
            title: dump.title,
            path: dump.file_path.unwrap_or(default_path),
            views: dump.views,
            documents: dump.documents,
            by_unid,
        }
    }

    pub fn document(&self, unid: &str) -> Option<&SourceDocument> {
        self.by_unid.get(unid).map(|&index| &self.documents[index])
    }
}

impl SourceStore for JsonSourceStore {
    type Record = SourceDocument;

    fn title(&self) -> &str {
        &self.title
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn view(&self, name: &str) -> Option<Vec<&SourceDocument>> {
        let entries = self.views.get(name)?;
        let documents = entries
            .iter()
            .filter_map(|unid| {
                let doc = self.document(unid);
                if doc.is_none() {
                    log::warn!("View {name} references missing document {unid}");
                }
                doc
            })
            .collect();
        Some(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"{
        "title": "OpenNTF Projects",
        "filePath": "projects/pmt.nsf",
        "views": {
            "(ProjectList)": ["B", "A", "GONE"]
        },
        "documents": [
            {"unid": "A", "created": "2020-01-01T00:00:00Z", "lastModified": "2020-01-02T00:00:00Z",
             "items": {"ProjectName": {"type": "text", "value": "Alpha"}}},
            {"unid": "B", "created": "2020-01-01T00:00:00Z", "lastModified": "2020-01-02T00:00:00Z",
             "items": {"ProjectName": {"type": "text", "value": "Beta"}}}
        ]
    }"#;

    #[test]
    fn test_view_keeps_view_order_and_drops_missing() {
        let store = JsonSourceStore::from_json(DUMP, "fallback").unwrap();

        let docs = store.view("(ProjectList)").unwrap();
        let names: Vec<String> = docs.iter().map(|d| d.text("ProjectName")).collect();

        assert_eq!(names, vec!["Beta", "Alpha"]);
    }

    #[test]
    fn test_unknown_view_is_none() {
        let store = JsonSourceStore::from_json(DUMP, "fallback").unwrap();
        assert!(store.view("ReleasesByDate").is_none());
    }

    #[test]
    fn test_path_prefers_dump_file_path() {
        let store = JsonSourceStore::from_json(DUMP, "fallback").unwrap();
        assert_eq!(store.path(), "projects/pmt.nsf");
        assert_eq!(store.title(), "OpenNTF Projects");

        let store = JsonSourceStore::from_json(r#"{"documents": []}"#, "fallback").unwrap();
        assert_eq!(store.path(), "fallback");
    }

    #[test]
    fn test_open_missing_file_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonSourceStore::open(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::StoreConnect { store: "source", .. }));
    }

    #[test]
    fn test_open_invalid_json_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonSourceStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::StoreConnect { .. }));
    }

    #[test]
    fn test_open_reads_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pmt.json");
        std::fs::write(&path, DUMP).unwrap();

        let store = JsonSourceStore::open(&path).unwrap();
        assert!(store.document("A").is_some());
    }
}

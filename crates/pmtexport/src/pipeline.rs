//! Export pipeline: enumerate a source view, map every record, upsert it into
//! the target store and stream it to the JSON export.

use std::io::Write;

use pmtexport_core::mapper::map_record;
use pmtexport_core::record::{NormalizedRecord, RecordKind};
use pmtexport_core::source::{SourceRecord, DISPLAY_NAME_ITEM};
use serde::Serialize;

use crate::error::{error_chain, Error};
use crate::sink::JsonSink;
use crate::source::SourceStore;
use crate::target::TargetStore;
use crate::upsert::upsert;

/// Source view enumerating the records of a kind.
pub fn view_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Project => "(ProjectList)",
        RecordKind::Release => "ReleasesByDate",
    }
}

/// JSON export property holding the records of a kind.
pub fn array_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Project => "projects",
        RecordKind::Release => "releases",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub id: String,
    pub label: String,
    pub error: String,
    /// Target store failures are highlighted in the summary.
    pub upsert: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub kind: RecordKind,
    /// Records written to both the target store and the JSON export.
    pub count: usize,
    /// Conflict and unnamed records.
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl ExportSummary {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            count: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Export every record of one kind.
///
/// Per-record mapping and upsert failures are collected in the summary.
/// A missing view or a failing JSON sink aborts the run.
pub fn run_export<S, T, W>(
    source: &S,
    target: &mut T,
    sink: &mut JsonSink<W>,
    kind: RecordKind,
) -> Result<ExportSummary, Error>
where
    S: SourceStore + ?Sized,
    T: TargetStore + ?Sized,
    W: Write,
{
    let view = view_name(kind);
    let documents = source.view(view).ok_or_else(|| Error::StoreConnect {
        store: "source",
        location: source.path().to_string(),
        reason: format!("view {view} not found"),
    })?;

    sink.begin_array(array_name(kind))
        .map_err(Error::ExportWrite)?;

    let mut summary = ExportSummary::new(kind);

    for (index, doc) in documents.into_iter().enumerate() {
        if doc.is_conflict() || doc.text(DISPLAY_NAME_ITEM).trim().is_empty() {
            log::debug!("Skipping document {} at {index}", doc.unid());
            summary.skipped += 1;
            continue;
        }

        let label = source_label(doc, kind);
        log::info!("{index}: {label}");

        match export_record(source.path(), target, doc) {
            Ok(record) => {
                sink.write_record(&record).map_err(Error::ExportWrite)?;
                summary.count += 1;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                let upsert = matches!(err, Error::Upsert(_));
                if upsert {
                    log::error!("Unable to store {label} ({}): {}", doc.unid(), error_chain(&err));
                } else {
                    log::warn!("Unable to map {label} ({}): {}", doc.unid(), error_chain(&err));
                }
                summary.failures.push(RecordFailure {
                    id: doc.unid().to_string(),
                    label,
                    error: error_chain(&err),
                    upsert,
                });
            }
        }
    }

    sink.end_array().map_err(Error::ExportWrite)?;

    log::info!(
        "Exported {} {} records ({} skipped, {} failed)",
        summary.count,
        kind,
        summary.skipped,
        summary.failures.len()
    );

    Ok(summary)
}

/// Export projects then releases into one JSON document.
pub fn export_all<S, T, W>(
    source: &S,
    target: &mut T,
    sink: &mut JsonSink<W>,
) -> Result<Vec<ExportSummary>, Error>
where
    S: SourceStore + ?Sized,
    T: TargetStore + ?Sized,
    W: Write,
{
    let projects = run_export(source, target, sink, RecordKind::Project)?;
    let releases = run_export(source, target, sink, RecordKind::Release)?;
    sink.finish().map_err(Error::ExportWrite)?;
    Ok(vec![projects, releases])
}

fn export_record<R, T>(source_path: &str, target: &mut T, doc: &R) -> Result<NormalizedRecord, Error>
where
    R: SourceRecord + ?Sized,
    T: TargetStore + ?Sized,
{
    let record = map_record(doc, source_path)?;
    upsert(target, &record)?;
    Ok(record)
}

/// `ProjectName` for projects, `ProjectName.ReleaseNumber` for releases.
fn source_label<R: SourceRecord + ?Sized>(doc: &R, kind: RecordKind) -> String {
    let name = doc.text(DISPLAY_NAME_ITEM);
    match kind {
        RecordKind::Project => name,
        RecordKind::Release => format!("{name}.{}", doc.text("ReleaseNumber")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JsonSourceStore;
    use crate::target::{NoteId, SqliteTargetStore, StoreError};
    use pmtexport_core::record::TargetDocument;
    use serde_json::{json, Value};

    const TS: &str = "2020-01-01T00:00:00Z";

    fn text(value: &str) -> Value {
        json!({"type": "text", "value": value})
    }

    fn document(unid: &str, items: Value) -> Value {
        json!({"unid": unid, "created": TS, "lastModified": TS, "items": items})
    }

    fn fixture() -> JsonSourceStore {
        let dump = json!({
            "title": "OpenNTF Projects",
            "filePath": "projects/pmt.nsf",
            "views": {
                "(ProjectList)": ["P1", "P2", "CONFLICT", "BLANK", "BROKEN"],
                "ReleasesByDate": ["R2", "R1"]
            },
            "documents": [
                document("P1", json!({
                    "Form": text("Project"),
                    "ProjectName": text("Demo"),
                    "Details": {"type": "composite", "value": {"content": [{"type": "html", "markup": "<b>Hi</b>"}]}},
                    "DownloadsProject": {"type": "number", "value": 5}
                })),
                document("P2", json!({"Form": text("Project"), "ProjectName": text("Other Tools")})),
                document("CONFLICT", json!({
                    "Form": text("Project"),
                    "ProjectName": text("Demo"),
                    "$Conflict": text("")
                })),
                document("BLANK", json!({"Form": text("Project"), "ProjectName": text("  ")})),
                document("BROKEN", json!({
                    "Form": text("Project"),
                    "ProjectName": text("Broken"),
                    "Details": {"type": "mime", "value": "Content-Type: multipart/mixed\n\nx"}
                })),
                document("R1", json!({
                    "Form": text("Release"),
                    "ProjectName": text("Demo"),
                    "ReleaseNumber": text("1.0"),
                    "Status": text("Yes")
                })),
                document("R2", json!({
                    "Form": text("Release"),
                    "ProjectName": text("Demo"),
                    "ReleaseNumber": text("2.0"),
                    "Status": text("No")
                }))
            ]
        });
        JsonSourceStore::from_json(&dump.to_string(), "fallback").unwrap()
    }

    fn run(source: &JsonSourceStore, target: &mut SqliteTargetStore) -> (Vec<ExportSummary>, Value) {
        let mut sink = JsonSink::new(Vec::new());
        let summaries = export_all(source, target, &mut sink).unwrap();
        let json = serde_json::from_slice(&sink.into_inner()).unwrap();
        (summaries, json)
    }

    fn ids(json: &Value, array: &str) -> Vec<String> {
        json[array]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    /// Target store refusing to create one record.
    struct RefusingStore {
        inner: SqliteTargetStore,
        refuse: &'static str,
    }

    impl TargetStore for RefusingStore {
        fn find_by_id(&self, id: &str) -> Result<Vec<NoteId>, StoreError> {
            self.inner.find_by_id(id)
        }

        fn delete(&mut self, note: NoteId) -> Result<(), StoreError> {
            self.inner.delete(note)
        }

        fn create(&mut self, document: &TargetDocument) -> Result<NoteId, StoreError> {
            if document.id() == Some(self.refuse) {
                return Err(StoreError::Other("disk quota exceeded".to_string()));
            }
            self.inner.create(document)
        }
    }

    /// Writer that fails as soon as a record body reaches it.
    struct FailingWriter {
        written: Vec<u8>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.windows(4).any(|w| w == b"\"id\"") {
                return Err(std::io::Error::other("no space left on device"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    // ============================================================================
    // Export tests
    // ============================================================================

    #[test]
    fn test_export_all_writes_projects_then_releases() {
        // Arrange
        let source = fixture();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();

        // Act
        let (summaries, json) = run(&source, &mut target);

        // Assert
        assert_eq!(ids(&json, "projects"), vec!["P1", "P2"]);
        assert_eq!(ids(&json, "releases"), vec!["R2", "R1"]);
        assert_eq!(summaries[0].kind, RecordKind::Project);
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].skipped, 2);
        assert_eq!(summaries[1].count, 2);
        assert!(summaries[1].is_clean());
    }

    #[test]
    fn test_project_scenario_lands_in_store_and_json() {
        let source = fixture();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();

        let (_, json) = run(&source, &mut target);

        let project = &json["projects"][0];
        assert_eq!(project["id"], "P1");
        assert_eq!(project["name"], "Demo");
        assert_eq!(project["detailsText"], "Hi");
        assert_eq!(project["downloads"], 5);
        assert_eq!(
            project["sourceUrl"],
            "https://www.openntf.org/main.nsf/project.xsp?r=project/Demo"
        );
        assert_eq!(project["sourcePath"], "projects/pmt.nsf");
        assert_eq!(json["projects"][1]["detailsBody"], Value::Null);

        let notes = target.find_by_id("P1").unwrap();
        assert_eq!(notes.len(), 1);
        let stored = target.load(notes[0]).unwrap().unwrap();
        assert_eq!(stored.kind, RecordKind::Project);
    }

    #[test]
    fn test_release_flags_export_as_booleans() {
        let source = fixture();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();

        let (_, json) = run(&source, &mut target);

        assert_eq!(json["releases"][0]["released"], false);
        assert_eq!(json["releases"][1]["released"], true);
        assert_eq!(json["releases"][1]["version"], "1.0");
    }

    #[test]
    fn test_conflict_and_blank_records_are_skipped_not_failed() {
        let source = fixture();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();

        let (summaries, _) = run(&source, &mut target);

        assert!(target.find_by_id("CONFLICT").unwrap().is_empty());
        assert!(target.find_by_id("BLANK").unwrap().is_empty());
        assert!(summaries[0]
            .failures
            .iter()
            .all(|f| f.id != "CONFLICT" && f.id != "BLANK"));
    }

    #[test]
    fn test_mapping_failure_does_not_stop_the_run() {
        let source = fixture();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();

        let (summaries, json) = run(&source, &mut target);

        let failures = &summaries[0].failures;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, "BROKEN");
        assert_eq!(failures[0].label, "Broken");
        assert!(!failures[0].upsert);
        assert!(failures[0].error.contains("'Details'"));
        assert!(!ids(&json, "projects").contains(&"BROKEN".to_string()));
        assert!(target.find_by_id("BROKEN").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_failure_is_recorded_and_excluded_from_json() {
        let source = fixture();
        let mut target = RefusingStore {
            inner: SqliteTargetStore::open_in_memory().unwrap(),
            refuse: "P2",
        };
        let mut sink = JsonSink::new(Vec::new());

        let summaries = export_all(&source, &mut target, &mut sink).unwrap();
        let json: Value = serde_json::from_slice(&sink.into_inner()).unwrap();

        let failures = &summaries[0].failures;
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].id, "P2");
        assert_eq!(failures[0].label, "Other Tools");
        assert!(failures[0].upsert);
        assert!(failures[0].error.contains("disk quota exceeded"));
        assert_eq!(ids(&json, "projects"), vec!["P1"]);
        assert_eq!(ids(&json, "releases"), vec!["R2", "R1"]);
    }

    #[test]
    fn test_missing_view_is_fatal() {
        let source = JsonSourceStore::from_json(r#"{"views": {}, "documents": []}"#, "pmt.json")
            .unwrap();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();
        let mut sink = JsonSink::new(Vec::new());

        let err = run_export(&source, &mut target, &mut sink, RecordKind::Project).unwrap_err();

        assert!(matches!(err, Error::StoreConnect { store: "source", .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_json_write_failure_aborts_the_run() {
        // Arrange
        let source = fixture();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();
        let mut sink = JsonSink::new(FailingWriter {
            written: Vec::new(),
        });

        // Act
        let err = export_all(&source, &mut target, &mut sink).unwrap_err();

        // Assert
        assert!(matches!(err, Error::ExportWrite(_)));
        assert!(err.is_fatal());
        assert!(error_chain(&err).contains("no space left on device"));
        assert_eq!(target.find_by_id("P1").unwrap().len(), 1);
        for id in ["P2", "BROKEN", "R1", "R2"] {
            assert!(target.find_by_id(id).unwrap().is_empty(), "record {id}");
        }
        assert_eq!(target.count_documents().unwrap(), 1);
        assert!(String::from_utf8(sink.into_inner().written)
            .unwrap()
            .starts_with("{\n  \"projects\": ["));
    }

    // ============================================================================
    // Idempotency tests
    // ============================================================================

    #[test]
    fn test_running_twice_keeps_one_record_per_id() {
        let source = fixture();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();

        let (_, first) = run(&source, &mut target);
        let (_, second) = run(&source, &mut target);

        assert_eq!(first, second);
        for id in ["P1", "P2", "R1", "R2"] {
            assert_eq!(target.find_by_id(id).unwrap().len(), 1, "record {id}");
        }
        assert_eq!(target.count_documents().unwrap(), 4);
    }

    #[test]
    fn test_rerun_restores_deleted_record_only() {
        // Arrange
        let source = fixture();
        let mut target = SqliteTargetStore::open_in_memory().unwrap();
        run(&source, &mut target);
        let p2_before = target.load(target.find_by_id("P2").unwrap()[0]).unwrap();
        let p1 = target.find_by_id("P1").unwrap()[0];
        target.delete(p1).unwrap();

        // Act
        run(&source, &mut target);

        // Assert
        assert_eq!(target.find_by_id("P1").unwrap().len(), 1);
        let p2_after = target.find_by_id("P2").unwrap();
        assert_eq!(p2_after.len(), 1);
        assert_eq!(target.load(p2_after[0]).unwrap(), p2_before);
        assert_eq!(target.count_documents().unwrap(), 4);
    }

    #[test]
    fn test_label_includes_release_number() {
        let source = fixture();
        let releases = source.view("ReleasesByDate").unwrap();
        assert_eq!(source_label(releases[0], RecordKind::Release), "Demo.2.0");
        assert_eq!(source_label(releases[0], RecordKind::Project), "Demo");
    }
}

//! Delete-then-create upsert keyed on the record id.

use pmtexport_core::record::NormalizedRecord;

use crate::target::{NoteId, StoreError, TargetStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertPhase {
    Begin,
    Lookup,
    Delete,
    Create,
    Commit,
}

impl std::fmt::Display for UpsertPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            UpsertPhase::Begin => "begin",
            UpsertPhase::Lookup => "lookup",
            UpsertPhase::Delete => "delete",
            UpsertPhase::Create => "create",
            UpsertPhase::Commit => "commit",
        };
        f.write_str(phase)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Record {id}: target store {phase} failed")]
pub struct UpsertError {
    pub id: String,
    pub phase: UpsertPhase,
    #[source]
    pub source: StoreError,
}

/// Replace every target document carrying `record.id()` with one fresh
/// document built from `record`.
pub fn upsert<T: TargetStore + ?Sized>(
    target: &mut T,
    record: &NormalizedRecord,
) -> Result<NoteId, UpsertError> {
    let id = record.id();
    let fail = |phase: UpsertPhase| {
        move |source: StoreError| UpsertError {
            id: id.to_string(),
            phase,
            source,
        }
    };

    target.begin().map_err(fail(UpsertPhase::Begin))?;

    let result = replace(target, record).and_then(|note| {
        target.commit().map_err(fail(UpsertPhase::Commit))?;
        Ok(note)
    });

    if result.is_err() {
        if let Err(e) = target.rollback() {
            log::warn!("Rollback failed for record {id}: {e}");
        }
    }

    result
}

fn replace<T: TargetStore + ?Sized>(
    target: &mut T,
    record: &NormalizedRecord,
) -> Result<NoteId, UpsertError> {
    let id = record.id();
    let fail = |phase: UpsertPhase, source: StoreError| UpsertError {
        id: id.to_string(),
        phase,
        source,
    };

    let existing = target
        .find_by_id(id)
        .map_err(|e| fail(UpsertPhase::Lookup, e))?;
    if existing.len() > 1 {
        log::warn!("Found {} target documents for id {id}", existing.len());
    }

    for note in existing {
        target
            .delete(note)
            .map_err(|e| fail(UpsertPhase::Delete, e))?;
    }

    target
        .create(&record.to_target_document())
        .map_err(|e| fail(UpsertPhase::Create, e))
}

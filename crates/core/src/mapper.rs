//! Pure transformation: legacy source document → normalized record.
//!
//! Field names on the left are the legacy item names, names on the right the
//! normalized record fields.
//!
//! | Project            | Release                        |
//! |--------------------|--------------------------------|
//! | ProjectName → name | ProjectName → projectName      |
//! | ProjectOverview → overview | ReleaseNumber → version |
//! | Details → detailsText/detailsBody | WhatsNew → descriptionText/descriptionBody |
//! | DownloadsProject → downloads | DownloadsRelease → downloads |
//! | MainCat → category | MainId → mainId                |
//! | MasterChef → chefs | ReleaseInCatalog → releaseStatus |
//! | ProjectCooks → cooks | Status → released            |
//! | Entry_Date → created | Entry_Person → chef          |
//! | ReleaseDate → latestReleaseDate | ReleaseDate → releaseDate |
//! | GithubProject → sourceControlUrl | MasterChef → masterChefs |
//! |                    | LicenseType → licenseType      |

use crate::error::RecordMappingError;
use crate::record::{NormalizedRecord, ProjectRecord, RecordKind, ReleaseRecord};
use crate::richtext::{normalize, MultiPartBody};
use crate::source::{SourceRecord, DISPLAY_NAME_ITEM, FORM_ITEM};

/// Public project page, followed by the encoded display name.
pub const PROJECT_URL_PREFIX: &str = "https://www.openntf.org/main.nsf/project.xsp?r=project/";

/// Build the persisted project page URL for a display name.
///
/// The name is form-encoded (`application/x-www-form-urlencoded` over UTF-8:
/// spaces become `+`, `*` stays literal) so that URLs stay identical to the
/// ones already stored by earlier exports.
pub fn project_source_url(display_name: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(display_name.as_bytes()).collect();
    format!("{PROJECT_URL_PREFIX}{encoded}")
}

/// Record kind selected by the document's discriminator item.
pub fn record_kind<R: SourceRecord + ?Sized>(src: &R) -> RecordKind {
    RecordKind::from_form(&src.text(FORM_ITEM))
}

/// Map a source document into a normalized record.
///
/// # Arguments
/// * `src` - The source document
/// * `source_path` - Reference path of the source store the document came from
///
/// # Errors
/// Fails as a unit when the designated rich-text item cannot be decoded or
/// the document has no identifier.
pub fn map_record<R: SourceRecord + ?Sized>(
    src: &R,
    source_path: &str,
) -> Result<NormalizedRecord, RecordMappingError> {
    if src.unid().trim().is_empty() {
        return Err(RecordMappingError::MissingIdentifier);
    }

    let record = match record_kind(src) {
        RecordKind::Project => NormalizedRecord::Project(map_project(src, source_path)?),
        RecordKind::Release => NormalizedRecord::Release(map_release(src, source_path)?),
    };

    Ok(record)
}

fn map_project<R: SourceRecord + ?Sized>(
    src: &R,
    source_path: &str,
) -> Result<ProjectRecord, RecordMappingError> {
    let name = src.text(DISPLAY_NAME_ITEM);
    let (details_text, details_body) = rich_text(src, "Details")?;

    Ok(ProjectRecord {
        id: src.unid().to_string(),
        source_url: project_source_url(&name),
        name,
        overview: src.text("ProjectOverview"),
        details_text,
        details_body,
        downloads: src.int("DownloadsProject", 0),
        category: src.text("MainCat"),
        chefs: src.text_list("MasterChef"),
        cooks: src.text_list("ProjectCooks"),
        created: src.date_time("Entry_Date", src.created()),
        latest_release_date: src.date_time("ReleaseDate", src.last_modified()),
        last_modified: src.last_modified(),
        source_control_url: src.text("GithubProject"),
        source_path: source_path.to_string(),
    })
}

fn map_release<R: SourceRecord + ?Sized>(
    src: &R,
    source_path: &str,
) -> Result<ReleaseRecord, RecordMappingError> {
    let project_name = src.text(DISPLAY_NAME_ITEM);
    let (description_text, description_body) = rich_text(src, "WhatsNew")?;

    Ok(ReleaseRecord {
        id: src.unid().to_string(),
        source_url: project_source_url(&project_name),
        project_name,
        version: src.text("ReleaseNumber"),
        release_date: src.date_time("ReleaseDate", src.last_modified()),
        description_text,
        description_body,
        downloads: src.int("DownloadsRelease", 0),
        main_id: src.text("MainId"),
        release_status: src.text("ReleaseInCatalog"),
        released: src.text("Status"),
        chef: src.text("Entry_Person"),
        master_chefs: src.text_list("MasterChef"),
        license_type: src.text("LicenseType"),
        source_path: source_path.to_string(),
    })
}

/// Normalize a designated rich-text item. Absent items map to empty text
/// and no body.
fn rich_text<R: SourceRecord + ?Sized>(
    src: &R,
    field: &str,
) -> Result<(String, Option<MultiPartBody>), RecordMappingError> {
    let Some(raw) = src.rich_text(field) else {
        return Ok((String::new(), None));
    };

    let normalized = normalize(&raw).map_err(|source| RecordMappingError::RichText {
        id: src.unid().to_string(),
        field: field.to_string(),
        source,
    })?;

    Ok((normalized.text, Some(normalized.body)))
}

//! Core library for pmtexport
//!
//! This crate implements the **Functional Core** of the pmtexport application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! The pmtexport project uses a two-crate architecture to enforce separation of concerns:
//!
//! - **`pmtexport_core`** (this crate): Pure transformation functions with zero I/O
//! - **`pmtexport`**: Store access, JSON export and orchestration (the Imperative Shell)
//!
//! ## Functional Core Principles
//!
//! All functions in this crate adhere to these principles:
//!
//! - **Pure functions**: Same input always produces the same output
//! - **No side effects**: No I/O operations, no external state mutations
//! - **Testable**: Can be tested with simple fixture data, no mocking required
//!
//! # Module Organization
//!
//! - [`source`]: Typed view over legacy source documents ([`source::SourceRecord`])
//! - [`richtext`]: Rich-text normalization (composite rendering, MIME bodies, plain text)
//! - [`html`]: Tolerant HTML-to-text extraction and fragment sanitizing
//! - [`record`]: Normalized Project/Release records and the target document shape
//! - [`mapper`]: Field mapping from a source document to a normalized record
//! - [`error`]: Error types for rich-text decoding and record mapping
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use pmtexport_core::mapper::map_record;
//! use pmtexport_core::source::{ItemValue, SourceDocument};
//!
//! // Create fixture data (no store required)
//! let doc = SourceDocument::new("P1", created, modified)
//!     .with_item("Form", ItemValue::Text("Project".into()))
//!     .with_item("ProjectName", ItemValue::Text("Demo".into()));
//!
//! // Transform using pure function
//! let record = map_record(&doc, "projects/pmt.nsf")?;
//!
//! assert_eq!(record.id(), "P1");
//! ```

pub mod error;
pub mod html;
pub mod mapper;
pub mod record;
pub mod richtext;
pub mod source;

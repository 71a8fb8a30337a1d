//! Bulk export and import of sheets.
//!
//! Exports are pretty-printed JSON arrays of every stored record. Imports
//! accept that format, or an object wrapping the array under `items` or
//! `data`, and create one record per element.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::form::{InFlight, Status};
use crate::identity::Session;
use crate::sheet::{NewSheet, SheetFields};
use crate::storage::{collect_all, RecordStore};

const EXPORT_FAILED_MESSAGE: &str = "Failed to export data.";
const IMPORT_FAILED_MESSAGE: &str = "Failed to import data.";
const UNSUPPORTED_SHAPE: &str = "Uploaded JSON must be an array or contain an items array.";

/// A finished export, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Suggested file name.
    pub filename: String,
    /// Pretty-printed JSON array of every record.
    pub json: String,
    /// Number of records exported.
    pub count: usize,
}

impl ExportReport {
    /// Status line for this export.
    #[must_use]
    pub fn message(&self) -> String {
        format!("Exported {} record(s).", self.count)
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records created.
    pub imported: usize,
    /// Elements ignored for lacking both `displayName` and `id`.
    pub skipped: usize,
    /// Elements whose create call failed.
    pub failed: usize,
}

impl ImportReport {
    /// Status line for this import. Only successes are reported.
    #[must_use]
    pub fn message(&self) -> String {
        format!("Imported {} record(s).", self.imported)
    }
}

/// Export file name: `<prefix>-<ISO timestamp>.json` with `:` and `.`
/// replaced by `-`.
#[must_use]
pub fn export_filename(prefix: &str, now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{prefix}-{stamp}.json")
}

/// Read every record and serialize them for download.
///
/// # Errors
///
/// Returns the store's error if any page fails to load.
pub async fn export_all(
    store: &dyn RecordStore,
    page_size: u32,
    prefix: &str,
    now: DateTime<Utc>,
) -> Result<ExportReport> {
    let records = collect_all(store, page_size).await?;
    let json = serde_json::to_string_pretty(&records)?;
    Ok(ExportReport {
        filename: export_filename(prefix, now),
        json,
        count: records.len(),
    })
}

/// Write an export into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_export(report: &ExportReport, dir: &Path) -> Result<PathBuf> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let path = dir.join(&report.filename);
    std::fs::write(&path, &report.json)?;
    info!("Wrote {} sheets to {}", report.count, path.display());
    Ok(path)
}

/// Parse an import file into its list of elements.
///
/// # Errors
///
/// Returns [`Error::InvalidImport`] if the text is not JSON, or is neither an
/// array nor an object holding an `items` or `data` array.
pub fn parse_import(text: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::invalid_import(format!("file is not valid JSON: {e}")))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => ["items", "data"]
            .into_iter()
            .find_map(|key| match object.remove(key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| Error::invalid_import(UNSUPPORTED_SHAPE)),
        _ => Err(Error::invalid_import(UNSUPPORTED_SHAPE)),
    }
}

/// JavaScript-style truthiness.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null | Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(_) => true,
    }
}

/// Turn one import element into a create request.
///
/// Returns `Ok(None)` for elements with neither a `displayName` nor an `id`.
/// A legacy `content` value fills `additionalNotes` when that is absent.
///
/// # Errors
///
/// Returns an error if the element's fields have the wrong types.
pub fn prepare_record(element: Value) -> Result<Option<NewSheet>> {
    let Value::Object(mut object) = element else {
        return Ok(None);
    };
    if !is_truthy(object.get("displayName")) && !is_truthy(object.get("id")) {
        return Ok(None);
    }

    remap_legacy_content(&mut object);

    let id = match object.remove("id") {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let fields: SheetFields = serde_json::from_value(Value::Object(object))?;
    Ok(Some(NewSheet { id, fields }))
}

fn remap_legacy_content(object: &mut Map<String, Value>) {
    let content = object.remove("content");
    if matches!(object.get("additionalNotes"), None | Some(Value::Null)) {
        let notes = content.unwrap_or(Value::Null);
        object.insert("additionalNotes".to_string(), notes);
    }
}

/// Create one record per element.
///
/// Failures of individual creates are logged and skipped.
pub async fn import_records(store: &dyn RecordStore, elements: Vec<Value>) -> ImportReport {
    let mut report = ImportReport::default();
    for (index, element) in elements.into_iter().enumerate() {
        let sheet = match prepare_record(element) {
            Ok(Some(sheet)) => sheet,
            Ok(None) => {
                debug!("Skipping import element {}: no displayName or id", index);
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!("Failed to import element {}: {}", index, e);
                report.failed += 1;
                continue;
            }
        };

        match store.create(sheet).await {
            Ok(record) => {
                debug!("Imported sheet {}", record.id);
                report.imported += 1;
            }
            Err(e) => {
                warn!("Failed to import element {}: {}", index, e);
                report.failed += 1;
            }
        }
    }
    info!(
        "Import finished: {} imported, {} skipped, {} failed",
        report.imported, report.skipped, report.failed
    );
    report
}

/// Admin export and import actions with their in-progress flags.
#[derive(Debug)]
pub struct DataManagement {
    store: Arc<dyn RecordStore>,
    page_size: u32,
    file_prefix: String,
    exporting: InFlight,
    importing: InFlight,
    status: Option<Status>,
}

impl DataManagement {
    /// Open the panel for an admin session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthorized`] for non-admin sessions.
    pub fn open(
        store: Arc<dyn RecordStore>,
        session: &Session,
        page_size: u32,
        file_prefix: impl Into<String>,
    ) -> Result<Self> {
        session.require_admin()?;
        Ok(Self {
            store,
            page_size,
            file_prefix: file_prefix.into(),
            exporting: InFlight::new(),
            importing: InFlight::new(),
            status: None,
        })
    }

    /// Export every record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionInProgress`] while an export runs, or the
    /// store's error.
    pub async fn export(&mut self) -> Result<ExportReport> {
        let _guard = self.exporting.try_begin("export")?;
        self.status = None;

        let result = export_all(
            self.store.as_ref(),
            self.page_size,
            &self.file_prefix,
            Utc::now(),
        )
        .await;
        self.record_outcome(result, ExportReport::message, EXPORT_FAILED_MESSAGE)
    }

    /// Import records from the uploaded file at `path`.
    ///
    /// An unreadable or unsupported file creates no records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionInProgress`] while an import runs, an I/O error
    /// if the file cannot be read, or [`Error::InvalidImport`] for an
    /// unsupported file.
    pub async fn import_file(&mut self, path: &Path) -> Result<ImportReport> {
        let _guard = self.importing.try_begin("import")?;
        self.status = None;

        let result = match std::fs::read_to_string(path).map_err(Error::from) {
            Ok(text) => self.import_text(&text).await,
            Err(e) => Err(e),
        };
        self.record_outcome(result, ImportReport::message, IMPORT_FAILED_MESSAGE)
    }

    async fn import_text(&self, text: &str) -> Result<ImportReport> {
        let elements = parse_import(text)?;
        debug!("Importing {} elements", elements.len());
        Ok(import_records(self.store.as_ref(), elements).await)
    }

    fn record_outcome<T>(
        &mut self,
        result: Result<T>,
        message: impl FnOnce(&T) -> String,
        fallback: &str,
    ) -> Result<T> {
        self.status = Some(match &result {
            Ok(report) => Status::Success(message(report)),
            Err(e) => Status::Failure(e.display_message(fallback)),
        });
        result
    }

    /// Check if an export is running.
    #[must_use]
    pub fn is_exporting(&self) -> bool {
        self.exporting.is_active()
    }

    /// Check if an import is running.
    #[must_use]
    pub fn is_importing(&self) -> bool {
        self.importing.is_active()
    }

    /// Outcome of the last action.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }
}

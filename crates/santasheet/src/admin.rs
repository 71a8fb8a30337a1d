//! Admin listing of every sheet.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::form::{InFlight, Status};
use crate::identity::Session;
use crate::sheet::SheetRecord;
use crate::storage::{collect_all, RecordStore};

const LOAD_FAILED_MESSAGE: &str = "Failed to load sheets.";

/// One summary row of the admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRow {
    /// Sheet id.
    pub id: String,
    /// Display name, or `Unknown`.
    pub name: String,
    /// Year, or `-`.
    pub year: String,
    /// Last update time, or `-`.
    pub updated: String,
}

impl AdminRow {
    /// Summarise a record.
    #[must_use]
    pub fn from_record(record: &SheetRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name_or("Unknown").to_string(),
            year: record
                .fields
                .year
                .map_or_else(|| "-".to_string(), |year| year.to_string()),
            updated: record.updated_at.map_or_else(
                || "-".to_string(),
                |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ),
        }
    }
}

/// Every sheet in the store, loaded page by page for an administrator.
#[derive(Debug)]
pub struct AdminSheetsPanel {
    store: Arc<dyn RecordStore>,
    page_size: u32,
    sheets: Vec<SheetRecord>,
    loading: InFlight,
    status: Option<Status>,
}

impl AdminSheetsPanel {
    /// Open the panel for an admin session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthorized`] for non-admin sessions.
    pub fn open(store: Arc<dyn RecordStore>, session: &Session, page_size: u32) -> Result<Self> {
        session.require_admin()?;
        Ok(Self {
            store,
            page_size,
            sheets: Vec::new(),
            loading: InFlight::new(),
            status: None,
        })
    }

    /// Fetch every page and replace the listing in one step.
    ///
    /// The listing is untouched until the last page arrives; on failure the
    /// previous listing stays and the error is recorded in the status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionInProgress`] while a load runs, or the store's
    /// error.
    pub async fn load_all(&mut self) -> Result<&[SheetRecord]> {
        let _guard = self.loading.try_begin("load")?;
        self.status = None;

        match collect_all(self.store.as_ref(), self.page_size).await {
            Ok(sheets) => {
                info!("Loaded {} sheets", sheets.len());
                self.sheets = sheets;
                Ok(&self.sheets)
            }
            Err(e) => {
                warn!("Failed to load sheets: {}", e);
                self.status = Some(Status::Failure(e.display_message(LOAD_FAILED_MESSAGE)));
                Err(e)
            }
        }
    }

    /// Check if a load is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.is_active()
    }

    /// Outcome of the last failed load.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// The loaded sheets.
    #[must_use]
    pub fn sheets(&self) -> &[SheetRecord] {
        &self.sheets
    }

    /// Summary rows of the loaded sheets.
    #[must_use]
    pub fn rows(&self) -> Vec<AdminRow> {
        self.sheets.iter().map(AdminRow::from_record).collect()
    }

    /// Hand the sheet with the given id to `on_select`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is not in the loaded listing.
    pub fn select<F>(&self, id: &str, on_select: F) -> Result<()>
    where
        F: FnOnce(&SheetRecord),
    {
        let record = self
            .sheets
            .iter()
            .find(|sheet| sheet.id == id)
            .ok_or_else(|| Error::not_found(id))?;
        on_select(record);
        Ok(())
    }
}

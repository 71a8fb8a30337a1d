//! Editable form state for one sheet.
//!
//! Every field is edited as a string. List fields round-trip through
//! newline-delimited text ([`serialize_list`] / [`parse_list`]); the year is
//! free text parsed on save ([`parse_year`]). [`SheetEditor`] binds a form to
//! a store and persists it on an explicit save.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Datelike;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sheet::{Field, FieldKind, NewSheet, SheetFields, SheetRecord};
use crate::storage::RecordStore;

/// Status text shown after a successful save.
pub const SAVED_MESSAGE: &str = "Saved!";

/// Status text shown when a save fails without a usable message.
const SAVE_FAILED_MESSAGE: &str = "Failed to save sheet.";

/// Join list entries into one editable text block, one entry per line.
///
/// Blank entries are dropped.
#[must_use]
pub fn serialize_list(items: &[String]) -> String {
    items
        .iter()
        .filter(|item| !item.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a text block into list entries.
///
/// Each line is trimmed, blank lines are dropped, and order is kept.
#[must_use]
pub fn parse_list(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the year field, falling back to `current_year`.
///
/// Like a browser's `parseInt`, leading whitespace is skipped and the leading
/// run of digits (with an optional sign) is used, so `"2024 "` and
/// `"2024-ish"` both read as 2024.
#[must_use]
pub fn parse_year(text: &str, current_year: i32) -> i32 {
    let text = text.trim_start();
    let unsigned = text.trim_start_matches(['+', '-']);
    let sign_len = text.len() - unsigned.len();
    if sign_len > 1 {
        return current_year;
    }
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits == 0 {
        return current_year;
    }
    text[..sign_len + digits].parse().unwrap_or(current_year)
}

/// The current calendar year in local time.
#[must_use]
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// The string value of every field, and whether any was edited since the
/// form was filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    values: BTreeMap<Field, String>,
    dirty: bool,
}

impl FormState {
    /// An empty form seeded with a display name and year.
    #[must_use]
    pub fn blank(display_name: &str, year: i32) -> Self {
        let mut values: BTreeMap<Field, String> =
            Field::ALL.into_iter().map(|f| (f, String::new())).collect();
        values.insert(Field::DisplayName, display_name.to_string());
        values.insert(Field::Year, year.to_string());
        Self {
            values,
            dirty: false,
        }
    }

    /// A form holding the contents of `record`.
    #[must_use]
    pub fn from_record(record: &SheetRecord, fallback_name: &str, current_year: i32) -> Self {
        let fields = &record.fields;
        let values = Field::ALL
            .into_iter()
            .map(|field| {
                let value = match field.kind() {
                    FieldKind::Year => fields.year.unwrap_or(current_year).to_string(),
                    FieldKind::List => serialize_list(fields.list(field).unwrap_or_default()),
                    FieldKind::Text if field == Field::DisplayName => {
                        record.name_or(fallback_name).to_string()
                    }
                    FieldKind::Text => fields.text(field).unwrap_or_default().to_string(),
                };
                (field, value)
            })
            .collect();
        Self {
            values,
            dirty: false,
        }
    }

    /// The current value of `field`.
    #[must_use]
    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map_or("", String::as_str)
    }

    /// Replace the value of `field`. Marks the form dirty.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
        self.dirty = true;
    }

    /// Check if any field was edited since the form was filled or saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Build the full save payload.
    ///
    /// An empty name saves as `fallback_name`; an unparsable year saves as
    /// `current_year`; list fields are re-split with [`parse_list`].
    #[must_use]
    pub fn to_fields(&self, fallback_name: &str, current_year: i32) -> SheetFields {
        let mut fields = SheetFields::default();
        for field in Field::ALL {
            let value = self.get(field);
            match field.kind() {
                FieldKind::Year => fields.year = Some(parse_year(value, current_year)),
                FieldKind::List => {
                    if let Some(list) = fields.list_mut(field) {
                        *list = parse_list(value);
                    }
                }
                FieldKind::Text => {
                    if let Some(text) = fields.text_mut(field) {
                        *text = value.to_string();
                    }
                }
            }
        }
        if fields.display_name.is_empty() {
            fields.display_name = fallback_name.to_string();
        }
        fields
    }
}

/// Which record an editor writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorMode {
    /// No record yet; saving creates one.
    New,
    /// Bound to an existing record; saving overwrites it.
    Existing {
        /// The bound record's id.
        id: String,
    },
}

/// Outcome of the last action, shown inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// The action succeeded.
    Success(String),
    /// The action failed.
    Failure(String),
}

impl Status {
    /// Render the status line.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Success(message) => message.clone(),
            Self::Failure(message) => format!("Error: {message}"),
        }
    }

    /// Check if this status reports a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// A flag marking an action as running, so its trigger can be disabled.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<AtomicBool>,
}

/// Clears its [`InFlight`] flag when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<AtomicBool>,
}

impl InFlight {
    /// Create an idle flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the action as running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionInProgress`] if it is already running.
    pub fn try_begin(&self, action: &'static str) -> Result<InFlightGuard> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::ActionInProgress { action })?;
        Ok(InFlightGuard {
            active: Arc::clone(&self.active),
        })
    }

    /// Check if the action is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Edits one sheet and saves it through a [`RecordStore`].
#[derive(Debug)]
pub struct SheetEditor {
    store: Arc<dyn RecordStore>,
    mode: EditorMode,
    source: Option<SheetRecord>,
    state: FormState,
    fallback_name: String,
    read_only: bool,
    saving: InFlight,
    status: Option<Status>,
}

impl SheetEditor {
    /// An editor for a new sheet, seeded with `fallback_name` and this year.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, fallback_name: impl Into<String>) -> Self {
        let fallback_name = fallback_name.into();
        Self {
            store,
            mode: EditorMode::New,
            source: None,
            state: FormState::blank(&fallback_name, current_year()),
            fallback_name,
            read_only: false,
            saving: InFlight::new(),
            status: None,
        }
    }

    /// Make the editor view-only; saving is refused.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Bind the editor to `sheet`, or to a new sheet when `None`.
    ///
    /// The form is replaced with the record's contents, discarding edits.
    pub fn load(&mut self, sheet: Option<&SheetRecord>) {
        self.source = sheet.cloned();
        match sheet {
            Some(record) => {
                self.mode = EditorMode::Existing {
                    id: record.id.clone(),
                };
                self.state = FormState::from_record(record, &self.fallback_name, current_year());
            }
            None => {
                self.mode = EditorMode::New;
                self.state = FormState::blank(&self.fallback_name, current_year());
            }
        }
    }

    /// Current binding.
    #[must_use]
    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    /// The record the form was last filled from; `None` for a new sheet.
    #[must_use]
    pub fn source(&self) -> Option<&SheetRecord> {
        self.source.as_ref()
    }

    /// Check if the form holds edits that have not been saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    /// Current form contents.
    #[must_use]
    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Current value of `field`.
    #[must_use]
    pub fn get(&self, field: Field) -> &str {
        self.state.get(field)
    }

    /// Edit `field`. Fields stay editable while a save is running.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.state.set(field, value);
    }

    /// Check if the editor refuses to save.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Check if a save is running; the save control should be disabled.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.saving.is_active()
    }

    /// Outcome of the last save.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// Save every field: update the bound record, or create one.
    ///
    /// The form is left untouched either way. A created record becomes the
    /// bound record once the store's subscription delivers it and the owner
    /// calls [`SheetEditor::load`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnly`] in read-only mode,
    /// [`Error::ActionInProgress`] while another save runs, or the store's
    /// error. Failures are also recorded in [`SheetEditor::status`].
    pub async fn save(&mut self) -> Result<SheetRecord> {
        if self.read_only {
            self.status = Some(Status::Failure(Error::ReadOnly.to_string()));
            return Err(Error::ReadOnly);
        }
        let _guard = self.saving.try_begin("save")?;
        self.status = None;

        let fields = self.state.to_fields(&self.fallback_name, current_year());
        let result = match &self.mode {
            EditorMode::Existing { id } => self.store.update(id, fields).await,
            EditorMode::New => self.store.create(NewSheet::new(fields)).await,
        };

        match result {
            Ok(record) => {
                debug!("Saved sheet {}", record.id);
                self.state.mark_clean();
                self.status = Some(Status::Success(SAVED_MESSAGE.to_string()));
                Ok(record)
            }
            Err(e) => {
                warn!("Failed to save sheet: {}", e);
                self.status = Some(Status::Failure(e.display_message(SAVE_FAILED_MESSAGE)));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::storage::SqliteStore;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open_in_memory().unwrap())
    }

    proptest! {
        #[test]
        fn prop_list_round_trip(
            raw in prop::collection::vec(r"[^\n\r]*\S[^\n\r]*", 1..20)
        ) {
            let list: Vec<String> = raw.iter().map(|entry| entry.trim().to_string()).collect();
            prop_assert_eq!(parse_list(&serialize_list(&list)), list);
        }

        #[test]
        fn prop_year_text_parses_back(year in any::<i32>(), current in 1900i32..2100) {
            prop_assert_eq!(parse_year(&year.to_string(), current), year);
            prop_assert_eq!(parse_year(&format!("  {year} "), current), year);
        }
    }

    #[test]
    fn test_list_round_trip_keeps_order_and_duplicates() {
        let list = strings(&["Target", "Peanut brittle", "Target", "抹茶 KitKat"]);
        assert_eq!(parse_list(&serialize_list(&list)), list);
    }

    #[test]
    fn test_serialize_blank_lists() {
        assert_eq!(serialize_list(&[]), "");
        assert_eq!(serialize_list(&strings(&["", "  ", "\t"])), "");
        assert_eq!(serialize_list(&strings(&["a", "", "b"])), "a\nb");
    }

    #[test]
    fn test_parse_list_trims_and_drops_blanks() {
        assert!(parse_list("").is_empty());
        assert_eq!(
            parse_list("  Pine \n\n\r\nVanilla\r\n   \nCinnamon"),
            strings(&["Pine", "Vanilla", "Cinnamon"])
        );
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2024", 2030), 2024);
        assert_eq!(parse_year(" 2024 ", 2030), 2024);
        assert_eq!(parse_year("2024-ish", 2030), 2024);
        assert_eq!(parse_year("-5", 2030), -5);
        assert_eq!(parse_year("abc", 2030), 2030);
        assert_eq!(parse_year("", 2030), 2030);
        assert_eq!(parse_year("--5", 2030), 2030);
        assert_eq!(parse_year("99999999999", 2030), 2030);
    }

    #[test]
    fn test_blank_form() {
        let form = FormState::blank("Ada", 2024);
        assert_eq!(form.get(Field::DisplayName), "Ada");
        assert_eq!(form.get(Field::Year), "2024");
        assert_eq!(form.get(Field::WishlistTopItems), "");
    }

    #[test]
    fn test_form_from_record() {
        let mut fields = SheetFields::seeded("", 2022);
        fields.favorite_scents = strings(&["Pine", "", "Vanilla"]);
        fields.clothing_sizes = "M / 32x30".to_string();
        let record = SheetRecord {
            id: "s1".to_string(),
            fields,
            updated_at: None,
        };

        let form = FormState::from_record(&record, "Fallback", 2030);
        assert_eq!(form.get(Field::DisplayName), "Fallback");
        assert_eq!(form.get(Field::Year), "2022");
        assert_eq!(form.get(Field::FavoriteScents), "Pine\nVanilla");
        assert_eq!(form.get(Field::ClothingSizes), "M / 32x30");
    }

    #[test]
    fn test_form_from_record_without_year() {
        let mut record = SheetRecord {
            id: "s1".to_string(),
            fields: SheetFields::default(),
            updated_at: None,
        };
        record.fields.year = None;
        let form = FormState::from_record(&record, "Fallback", 2030);
        assert_eq!(form.get(Field::Year), "2030");
    }

    #[test]
    fn test_to_fields() {
        let mut form = FormState::blank("", 2024);
        form.set(Field::Year, "next year");
        form.set(Field::WishlistTopItems, "Socks\n\n  Book  \n");
        form.set(Field::FavoriteSaying, "  Ho ho ho  ");

        let fields = form.to_fields("Ada", 2031);
        assert_eq!(fields.display_name, "Ada");
        assert_eq!(fields.year, Some(2031));
        assert_eq!(fields.wishlist_top_items, strings(&["Socks", "Book"]));
        assert_eq!(fields.favorite_saying, "  Ho ho ho  ");
    }

    #[test]
    fn test_in_flight_guard() {
        let flag = InFlight::new();
        let guard = flag.try_begin("export").unwrap();
        assert!(flag.is_active());
        assert!(matches!(
            flag.try_begin("export"),
            Err(Error::ActionInProgress { action: "export" })
        ));
        drop(guard);
        assert!(!flag.is_active());
        assert!(flag.try_begin("export").is_ok());
    }

    #[test]
    fn test_status_render() {
        assert_eq!(Status::Success("Saved!".to_string()).render(), "Saved!");
        let failure = Status::Failure("offline".to_string());
        assert_eq!(failure.render(), "Error: offline");
        assert!(failure.is_failure());
    }

    #[tokio::test]
    async fn test_save_new_creates_record() {
        let store = store();
        let mut editor = SheetEditor::new(store.clone(), "Ada Lovelace");
        assert_eq!(editor.mode(), &EditorMode::New);
        editor.set(Field::FavoriteCandySnack, "Fudge\nTaffy");

        let record = editor.save().await.unwrap();
        assert_eq!(record.fields.display_name, "Ada Lovelace");
        assert_eq!(record.fields.year, Some(current_year()));
        assert_eq!(record.fields.favorite_candy_snack, strings(&["Fudge", "Taffy"]));
        assert_eq!(editor.status().unwrap().render(), "Saved!");
        assert!(!editor.is_saving());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_existing_overwrites() {
        let store = store();
        let created = store
            .insert(&NewSheet::new(SheetFields::seeded("Bob", 2023)))
            .unwrap();

        let mut editor = SheetEditor::new(store.clone(), "Bob");
        editor.load(Some(&created));
        assert_eq!(
            editor.mode(),
            &EditorMode::Existing {
                id: created.id.clone()
            }
        );
        editor.set(Field::Year, "2025");
        editor.set(Field::FavoriteStores, "REI");
        editor.save().await.unwrap();

        let stored = store.get(&created.id).unwrap().unwrap();
        assert_eq!(stored.fields.year, Some(2025));
        assert_eq!(stored.fields.favorite_stores, strings(&["REI"]));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_form() {
        let store = store();
        let ghost = SheetRecord {
            id: "deleted-elsewhere".to_string(),
            fields: SheetFields::seeded("Ghost", 2024),
            updated_at: None,
        };
        let mut editor = SheetEditor::new(store, "Ghost");
        editor.load(Some(&ghost));
        editor.set(Field::AdditionalNotes, "keep me");

        let err = editor.save().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(editor.get(Field::AdditionalNotes), "keep me");
        let status = editor.status().unwrap();
        assert!(status.is_failure());
        assert!(status.render().contains("deleted-elsewhere"));
        assert!(!editor.is_saving());
    }

    #[tokio::test]
    async fn test_read_only_refuses_save() {
        let store = store();
        let mut editor = SheetEditor::new(store.clone(), "Admin").read_only(true);
        assert!(editor.is_read_only());
        assert!(matches!(editor.save().await, Err(Error::ReadOnly)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_refused_while_in_flight() {
        let store = store();
        let mut editor = SheetEditor::new(store.clone(), "Ada");
        let _held = editor.saving.try_begin("save").unwrap();

        assert!(editor.is_saving());
        assert!(matches!(
            editor.save().await,
            Err(Error::ActionInProgress { .. })
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_load_none_resets_to_new() {
        let store: Arc<dyn RecordStore> = store();
        let record = SheetRecord {
            id: "s1".to_string(),
            fields: SheetFields::seeded("Ada", 2020),
            updated_at: None,
        };
        let mut editor = SheetEditor::new(store, "Fallback");
        editor.load(Some(&record));
        editor.load(None);
        assert_eq!(editor.mode(), &EditorMode::New);
        assert_eq!(editor.get(Field::DisplayName), "Fallback");
    }

    #[test]
    fn test_form_dirty_tracking() {
        let mut form = FormState::blank("Ada", 2024);
        assert!(!form.is_dirty());
        form.set(Field::FavoriteSaying, "Ho ho ho");
        assert!(form.is_dirty());
        form.mark_clean();
        assert!(!form.is_dirty());
    }

    #[tokio::test]
    async fn test_successful_save_clears_dirty_and_load_records_source() {
        let store = store();
        let mut editor = SheetEditor::new(store.clone(), "Ada");
        assert!(editor.source().is_none());

        editor.set(Field::ClothingSizes, "S");
        assert!(editor.is_dirty());
        let saved = editor.save().await.unwrap();
        assert!(!editor.is_dirty());

        editor.load(Some(&saved));
        assert_eq!(editor.source(), Some(&saved));
        assert!(!editor.is_dirty());
    }
}

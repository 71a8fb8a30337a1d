//! Top-level view state for a signed-in user.
//!
//! [`SheetApp`] keeps the latest full snapshot from the store's subscription
//! and decides what the user sees: a prompt to create their sheet, their own
//! editor, or (for admins) a read-only view of a selected sheet.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::form::{current_year, SheetEditor};
use crate::identity::Session;
use crate::sheet::{NewSheet, SheetFields, SheetRecord};
use crate::storage::{RecordStore, Subscription};

/// What the signed-in user is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetView {
    /// No sheet exists yet; offer to create one.
    CreatePrompt,
    /// The user's own sheet, editable.
    Editor(SheetRecord),
    /// An admin inspecting a sheet without editing it.
    AdminView(Option<SheetRecord>),
}

/// Session-scoped application state.
#[derive(Debug)]
pub struct SheetApp {
    store: Arc<dyn RecordStore>,
    session: Session,
    subscription: Subscription,
    sheets: Vec<SheetRecord>,
    selected: Option<String>,
    editor: SheetEditor,
}

impl SheetApp {
    /// Start the app for `session` and subscribe to the store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, session: Session) -> Self {
        let subscription = store.subscribe();
        let editor = SheetEditor::new(Arc::clone(&store), session.display_name.clone())
            .read_only(session.is_admin);
        Self {
            store,
            session,
            subscription,
            sheets: Vec::new(),
            selected: None,
            editor,
        }
    }

    /// The signed-in session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Wait for the next snapshot and apply it.
    ///
    /// The first call returns immediately with the current collection.
    /// Returns `false` once the store has gone away.
    pub async fn refresh(&mut self) -> bool {
        match self.subscription.next().await {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    /// Apply a pending snapshot without waiting. Returns `true` if one was applied.
    pub fn try_refresh(&mut self) -> bool {
        match self.subscription.try_next() {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    /// Replace the whole list and refill the editor from the visible sheet.
    ///
    /// A different visible sheet always rebinds the editor. A newer version
    /// of the bound sheet refills it unless the form holds unsaved edits.
    fn apply_snapshot(&mut self, snapshot: Vec<SheetRecord>) {
        debug!("Received snapshot of {} sheets", snapshot.len());
        self.sheets = snapshot;

        let visible = self.current().cloned();
        let reload = match (visible.as_ref(), self.editor.source()) {
            (None, None) => false,
            (Some(visible), Some(source)) if visible.id == source.id => {
                if visible == source {
                    false
                } else if self.editor.is_dirty() {
                    debug!("Keeping unsaved edits over newer sheet {}", visible.id);
                    false
                } else {
                    true
                }
            }
            _ => true,
        };
        if reload {
            self.editor.load(visible.as_ref());
        }
    }

    /// The latest snapshot.
    #[must_use]
    pub fn sheets(&self) -> &[SheetRecord] {
        &self.sheets
    }

    /// The sheet currently shown: the admin's selection (or the first sheet),
    /// or for everyone else the first sheet.
    #[must_use]
    pub fn current(&self) -> Option<&SheetRecord> {
        let selected = self
            .selected
            .as_deref()
            .filter(|_| self.session.is_admin)
            .and_then(|id| self.sheets.iter().find(|sheet| sheet.id == id));
        selected.or_else(|| self.sheets.first())
    }

    /// What to show.
    #[must_use]
    pub fn view(&self) -> SheetView {
        let current = self.current().cloned();
        if self.session.is_admin {
            return SheetView::AdminView(current);
        }
        current.map_or(SheetView::CreatePrompt, SheetView::Editor)
    }

    /// Show the sheet with the given id. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthorized`] for non-admins or
    /// [`Error::NotFound`] if the id is not in the latest snapshot.
    pub fn select_sheet(&mut self, id: &str) -> Result<()> {
        self.session.require_admin()?;
        let record = self
            .sheets
            .iter()
            .find(|sheet| sheet.id == id)
            .ok_or_else(|| Error::not_found(id))?;
        self.editor.load(Some(record));
        self.selected = Some(id.to_string());
        Ok(())
    }

    /// Create the user's sheet, seeded with their name and this year.
    ///
    /// The new sheet appears once the subscription delivers it.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn create_sheet(&mut self) -> Result<SheetRecord> {
        let fields = SheetFields::seeded(self.session.display_name.clone(), current_year());
        let record = self.store.create(NewSheet::new(fields)).await?;
        info!("Created sheet {} for {}", record.id, self.session.login_id);
        Ok(record)
    }

    /// The editor bound to the visible sheet.
    #[must_use]
    pub fn editor(&self) -> &SheetEditor {
        &self.editor
    }

    /// Mutable access to the editor.
    pub fn editor_mut(&mut self) -> &mut SheetEditor {
        &mut self.editor
    }

    /// Leave the view and stop listening for changes.
    pub fn close(self) {
        self.subscription.unsubscribe();
        debug!("Closed sheet view for {}", self.session.login_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::EditorMode;
    use crate::sheet::Field;
    use crate::storage::SqliteStore;

    fn session(is_admin: bool) -> Session {
        Session {
            login_id: "kid@example.com".to_string(),
            display_name: "Kid".to_string(),
            is_admin,
        }
    }

    #[tokio::test]
    async fn test_create_prompt_then_editor() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut app = SheetApp::new(store, session(false));

        assert!(app.refresh().await);
        assert_eq!(app.view(), SheetView::CreatePrompt);

        let created = app.create_sheet().await.unwrap();
        assert_eq!(created.fields.display_name, "Kid");
        assert_eq!(created.fields.year, Some(current_year()));

        assert!(app.refresh().await);
        assert_eq!(app.sheets().len(), 1);
        match app.view() {
            SheetView::Editor(record) => assert_eq!(record.id, created.id),
            other => panic!("expected editor, got {other:?}"),
        }
        assert_eq!(
            app.editor().mode(),
            &EditorMode::Existing { id: created.id }
        );
        app.close();
    }

    #[tokio::test]
    async fn test_new_sheet_binds_after_save_round_trip() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut app = SheetApp::new(store, session(false));
        app.refresh().await;

        app.editor_mut().set(Field::FavoriteScents, "Pine");
        let saved = app.editor_mut().save().await.unwrap();
        assert_eq!(app.editor().mode(), &EditorMode::New);

        assert!(app.try_refresh());
        assert_eq!(app.editor().mode(), &EditorMode::Existing { id: saved.id });
        assert_eq!(app.editor().get(Field::FavoriteScents), "Pine");
    }

    #[tokio::test]
    async fn test_clean_editor_follows_remote_update() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let created = store
            .insert(&NewSheet::new(SheetFields::seeded("Kid", 2024)))
            .unwrap();
        let mut app = SheetApp::new(store.clone(), session(false));
        app.refresh().await;
        assert_eq!(app.editor().get(Field::ClothingSizes), "");

        let mut remote = created.fields.clone();
        remote.clothing_sizes = "XL".to_string();
        store.update(&created.id, remote).await.unwrap();
        assert!(app.try_refresh());
        assert_eq!(app.editor().get(Field::ClothingSizes), "XL");

        app.editor_mut().save().await.unwrap();
        let stored = store.get(&created.id).unwrap().unwrap();
        assert_eq!(stored.fields.clothing_sizes, "XL");
    }

    #[tokio::test]
    async fn test_snapshot_keeps_unsaved_edits_of_bound_sheet() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut app = SheetApp::new(store.clone(), session(false));
        let created = app.create_sheet().await.unwrap();
        app.refresh().await;

        app.editor_mut().set(Field::ClothingSizes, "L");
        store
            .update(&created.id, SheetFields::seeded("Kid", 2020))
            .await
            .unwrap();
        assert!(app.try_refresh());
        assert_eq!(app.editor().get(Field::ClothingSizes), "L");
        assert_eq!(app.sheets()[0].fields.year, Some(2020));
    }

    #[tokio::test]
    async fn test_admin_selects_sheet_read_only() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .insert(&NewSheet::with_id("a", SheetFields::seeded("Ada", 2024)))
            .unwrap();
        store
            .insert(&NewSheet::with_id("b", SheetFields::seeded("Bob", 2024)))
            .unwrap();

        let mut app = SheetApp::new(store, session(true));
        app.refresh().await;
        match app.view() {
            SheetView::AdminView(Some(record)) => assert_eq!(record.id, "a"),
            other => panic!("expected admin view, got {other:?}"),
        }

        app.select_sheet("b").unwrap();
        assert_eq!(app.current().unwrap().id, "b");
        assert_eq!(app.editor().get(Field::DisplayName), "Bob");
        assert!(matches!(
            app.editor_mut().save().await,
            Err(Error::ReadOnly)
        ));
        assert!(app.select_sheet("zzz").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_non_admin_cannot_select() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut app = SheetApp::new(store, session(false));
        app.refresh().await;
        assert!(matches!(
            app.select_sheet("a"),
            Err(Error::NotAuthorized { .. })
        ));
    }
}

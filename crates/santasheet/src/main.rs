//! `santa` - CLI for Santa's Cheat Sheet
//!
//! This binary signs in as a configured user and drives the sheet editor,
//! the admin listing, and bulk export/import from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use santasheet::admin::AdminSheetsPanel;
use santasheet::app::{SheetApp, SheetView};
use santasheet::cli::{
    Cli, Command, ConfigCommand, EditCommand, ExportCommand, ImportCommand, ListCommand,
    ShareCommand, ShowCommand,
};
use santasheet::identity::{ConfigDirectory, IdentityGate, Session};
use santasheet::share::{compose_link, render_sheet, write_share};
use santasheet::storage::{RecordStore, SqliteStore};
use santasheet::transfer::{write_export, DataManagement};
use santasheet::{init_logging, Config, Error, SheetRecord};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let database_path = config.database_path();
    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteStore::open(&database_path)
            .with_context(|| format!("failed to open {}", database_path.display()))?,
    );
    let session = sign_in(&config, cli.user.as_deref()).await?;

    match cli.command {
        Command::Show(cmd) => handle_show(store, session, &cmd).await,
        Command::Create => handle_create(store, session).await,
        Command::Edit(cmd) => handle_edit(store, session, cmd).await,
        Command::List(cmd) => handle_list(&config, store, &session, &cmd).await,
        Command::Export(cmd) => handle_export(&config, store, &session, &cmd).await,
        Command::Import(cmd) => handle_import(&config, store, &session, &cmd).await,
        Command::Share(cmd) => handle_share(&config, store, &session, &cmd).await,
        Command::Watch => handle_watch(store, session).await,
        Command::Config(_) => Ok(()),
    }
}

async fn sign_in(config: &Config, user: Option<&str>) -> anyhow::Result<Session> {
    let login_id = user.ok_or(Error::NotSignedIn).context("pass --user or set SANTASHEET_USER")?;
    let gate = IdentityGate::new(
        Arc::new(ConfigDirectory::new(&config.identity.profiles)),
        config.admin_allow_list(),
        config.identity.fallback_name.clone(),
    );
    Ok(gate.sign_in(login_id).await?)
}

fn print_sheet(record: &SheetRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        print!("{}", render_sheet(record));
    }
    Ok(())
}

async fn open_app(store: Arc<dyn RecordStore>, session: Session) -> anyhow::Result<SheetApp> {
    let mut app = SheetApp::new(store, session);
    if !app.refresh().await {
        bail!("sheet store closed unexpectedly");
    }
    Ok(app)
}

async fn handle_show(
    store: Arc<dyn RecordStore>,
    session: Session,
    cmd: &ShowCommand,
) -> anyhow::Result<()> {
    let mut app = open_app(store, session).await?;
    if let Some(id) = &cmd.id {
        app.select_sheet(id)?;
    }

    match app.view() {
        SheetView::CreatePrompt => {
            println!("You don't have a sheet yet. Run `santa create` to start one.");
        }
        SheetView::Editor(record) | SheetView::AdminView(Some(record)) => {
            print_sheet(&record, cmd.json)?;
        }
        SheetView::AdminView(None) => println!("No sheets yet."),
    }
    app.close();
    Ok(())
}

async fn handle_create(store: Arc<dyn RecordStore>, session: Session) -> anyhow::Result<()> {
    let mut app = open_app(store, session).await?;
    if app.view() != SheetView::CreatePrompt {
        println!("A sheet already exists; use `santa edit` to change it.");
        return Ok(());
    }

    let record = app.create_sheet().await.context("failed to create sheet")?;
    println!("Created sheet {} for {}", record.id, record.fields.display_name);
    if app.try_refresh() {
        if let SheetView::Editor(current) = app.view() {
            println!("Editing sheet {}; use `santa edit` to fill it in.", current.id);
        }
    }
    app.close();
    Ok(())
}

async fn handle_edit(
    store: Arc<dyn RecordStore>,
    session: Session,
    cmd: EditCommand,
) -> anyhow::Result<()> {
    let mut app = open_app(store, session).await?;
    let editor = app.editor_mut();
    for (field, value) in cmd.assignments {
        editor.set(field, value);
    }

    let result = editor.save().await;
    if let Some(status) = editor.status() {
        println!("{}", status.render());
    }
    result.context("failed to save sheet")?;
    app.close();
    Ok(())
}

async fn handle_list(
    config: &Config,
    store: Arc<dyn RecordStore>,
    session: &Session,
    cmd: &ListCommand,
) -> anyhow::Result<()> {
    let mut panel = AdminSheetsPanel::open(store, session, config.storage.page_size)?;
    panel.load_all().await.context("failed to load sheets")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(panel.sheets())?);
        return Ok(());
    }

    println!("{:<38} {:<24} {:<6} Updated", "Id", "Name", "Year");
    for row in panel.rows() {
        println!("{:<38} {:<24} {:<6} {}", row.id, row.name, row.year, row.updated);
    }
    println!();
    println!("{} sheet(s)", panel.sheets().len());
    Ok(())
}

async fn handle_export(
    config: &Config,
    store: Arc<dyn RecordStore>,
    session: &Session,
    cmd: &ExportCommand,
) -> anyhow::Result<()> {
    let mut data = DataManagement::open(
        store,
        session,
        config.storage.page_size,
        config.export.file_prefix.clone(),
    )?;
    let report = data.export().await.context("failed to export data")?;

    let dir = cmd.output.clone().unwrap_or_else(|| config.export_dir());
    let path = write_export(&report, &dir)?;
    println!("{}", report.message());
    println!("Wrote {}", path.display());
    Ok(())
}

async fn handle_import(
    config: &Config,
    store: Arc<dyn RecordStore>,
    session: &Session,
    cmd: &ImportCommand,
) -> anyhow::Result<()> {
    let mut data = DataManagement::open(
        store,
        session,
        config.storage.page_size,
        config.export.file_prefix.clone(),
    )?;
    let result = data.import_file(&cmd.file).await;
    if let Some(status) = data.status() {
        println!("{}", status.render());
    }
    let report =
        result.with_context(|| format!("failed to import {}", cmd.file.display()))?;
    if report.skipped > 0 || report.failed > 0 {
        println!("Skipped {}, failed {}", report.skipped, report.failed);
    }
    Ok(())
}

async fn handle_share(
    config: &Config,
    store: Arc<dyn RecordStore>,
    session: &Session,
    cmd: &ShareCommand,
) -> anyhow::Result<()> {
    let mut panel = AdminSheetsPanel::open(store, session, config.storage.page_size)?;
    panel.load_all().await.context("failed to load sheets")?;

    let mut selected = None;
    panel.select(&cmd.id, |record| selected = Some(record.clone()))?;
    let Some(record) = selected else {
        bail!("sheet not found: {}", cmd.id);
    };

    let dir = cmd.output.clone().unwrap_or_else(|| config.export_dir());
    let path = write_share(&record, &dir)?;
    println!("Wrote {}", path.display());
    println!("{}", compose_link(&config.share.compose_url, &record));
    Ok(())
}

async fn handle_watch(store: Arc<dyn RecordStore>, session: Session) -> anyhow::Result<()> {
    let mut app = SheetApp::new(store, session);
    loop {
        tokio::select! {
            changed = app.refresh() => {
                if !changed {
                    break;
                }
                let names: Vec<_> = app
                    .sheets()
                    .iter()
                    .map(|sheet| sheet.name_or("Unknown").to_string())
                    .collect();
                println!("{} sheet(s): {}", names.len(), names.join(", "));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    app.close();
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Page size:          {}", config.storage.page_size);
                println!();
                println!("[Admin]");
                println!("  Admin emails:       {}", config.admin.emails.len());
                println!();
                println!("[Identity]");
                println!("  Fallback name:      {}", config.identity.fallback_name);
                println!("  Profiles:           {}", config.identity.profiles.len());
                println!();
                println!("[Export]");
                println!("  Output directory:   {}", config.export_dir().display());
                println!("  File prefix:        {}", config.export.file_prefix);
                println!();
                println!("[Share]");
                println!("  Compose URL:        {}", config.share.compose_url);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            match file {
                Some(path) => {
                    Config::load_from(Some(path.clone()))
                        .with_context(|| format!("invalid configuration in {}", path.display()))?;
                    println!("Configuration in {} is valid", path.display());
                }
                None => {
                    config.validate()?;
                    println!("Configuration is valid");
                }
            }
        }
    }
    Ok(())
}

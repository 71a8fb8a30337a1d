//! `santasheet` - Santa's Cheat Sheet
//!
//! Personal gift-preference sheets: each user keeps one sheet of favorites,
//! sizes, and wishlist items. Administrators on a configured allow-list can
//! browse every sheet, export and import the whole collection as JSON, and
//! share a printable copy.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod admin;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod identity;
pub mod logging;
pub mod share;
pub mod sheet;
pub mod storage;
pub mod transfer;

pub use app::{SheetApp, SheetView};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use sheet::{Field, NewSheet, SheetFields, SheetRecord};
pub use storage::{RecordStore, SqliteStore, Subscription};

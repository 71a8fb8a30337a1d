//! Printable rendering of a sheet and a pre-filled email link for sending it.

use std::fmt;
use std::path::{Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::info;

use crate::error::Result;
use crate::sheet::{Field, FieldKind, SheetRecord};

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Plain-text printout of a sheet, one question per entry.
#[derive(Debug, Clone, Copy)]
pub struct SheetPrintout<'a>(pub &'a SheetRecord);

impl fmt::Display for SheetPrintout<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = &self.0.fields;
        writeln!(f, "Santa's Cheat Sheet")?;
        writeln!(f, "===================")?;

        for field in Field::ALL {
            match field.kind() {
                FieldKind::Year => {
                    let year = fields.year.map(|y| y.to_string()).unwrap_or_default();
                    writeln!(f, "{}: {}", field.label(), year)?;
                }
                FieldKind::Text => {
                    let text = fields.text(field).unwrap_or_default();
                    writeln!(f, "{}: {}", field.label(), text)?;
                }
                FieldKind::List => {
                    writeln!(f, "{}:", field.label())?;
                    for item in fields.list(field).unwrap_or_default() {
                        writeln!(f, "  - {item}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Render a sheet as plain text.
#[must_use]
pub fn render_sheet(record: &SheetRecord) -> String {
    SheetPrintout(record).to_string()
}

/// File name for a shared sheet: `santa-sheet-<name>.txt`.
#[must_use]
pub fn share_filename(record: &SheetRecord) -> String {
    let name = record.name_or("friend").replace(['/', '\\'], "-");
    format!("santa-sheet-{name}.txt")
}

/// A webmail compose link with the sheet's subject and a short body.
#[must_use]
pub fn compose_link(compose_url: &str, record: &SheetRecord) -> String {
    let year = record.fields.year.map(|y| y.to_string()).unwrap_or_default();
    let subject = format!("Santa sheet for {} ({year})", record.name_or("Unknown"));
    let body = format!("See attached sheet ({}).", share_filename(record));

    let separator = if compose_url.contains('?') { '&' } else { '?' };
    format!(
        "{compose_url}{separator}su={}&body={}",
        utf8_percent_encode(&subject, URI_COMPONENT),
        utf8_percent_encode(&body, URI_COMPONENT)
    )
}

/// Write the printable sheet into `dir`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_share(record: &SheetRecord, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(share_filename(record));
    std::fs::write(&path, render_sheet(record))?;
    info!("Wrote sheet {} to {}", record.id, path.display());
    Ok(path)
}

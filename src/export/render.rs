//! CSV and templated text rendering of selected rows

use crate::config::DEFAULT_TEMPLATE;
use crate::export::Column;
use crate::proxy::models::ProxyRow;
use csv::Writer;
use log::info;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Matches `{Name}` placeholders in export templates
static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("Invalid placeholder regex"));

/// Reasons an export cannot be produced
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Select at least one proxy to export")]
    EmptySelection,
    #[error("Select at least one column to export")]
    NoColumns,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Text,
}

impl ExportFormat {
    /// `.csv` files are tabular, anything else is templated text
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Text,
        }
    }
}

/// How selected rows are written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportMode {
    /// Header plus one CSV record per row
    Tabular,
    /// One line per row from a `{Name}` template; empty means the default template
    Templated(String),
}

/// Rows and columns chosen for export
#[derive(Debug, Clone)]
pub struct ExportSelection<'a> {
    pub rows: Vec<&'a ProxyRow>,
    pub columns: Vec<Column>,
}

impl<'a> ExportSelection<'a> {
    pub fn new(rows: Vec<&'a ProxyRow>, columns: Vec<Column>) -> Self {
        Self { rows, columns }
    }

    /// Select rows with every column
    pub fn all_columns(rows: Vec<&'a ProxyRow>) -> Self {
        Self::new(rows, Column::ALL.to_vec())
    }

    /// Chosen columns in canonical order, without duplicates
    pub fn canonical_columns(&self) -> Vec<Column> {
        let mut columns = self.columns.clone();
        columns.sort();
        columns.dedup();
        columns
    }
}

/// Render the selection as CSV: a header of the chosen columns, then one record per row
pub fn render_tabular(selection: &ExportSelection<'_>) -> Result<String, ExportError> {
    if selection.rows.is_empty() {
        return Err(ExportError::EmptySelection);
    }
    let columns = selection.canonical_columns();
    if columns.is_empty() {
        return Err(ExportError::NoColumns);
    }

    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(columns.iter().map(Column::name))?;
    for row in &selection.rows {
        writer.write_record(columns.iter().map(|column| column.value(row)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Every placeholder a template may use for a row
pub fn template_values(row: &ProxyRow) -> HashMap<&'static str, String> {
    let mut values: HashMap<&'static str, String> = Column::ALL
        .iter()
        .map(|column| (column.name(), column.value(row)))
        .collect();
    values.insert("Port", row.credential.port.clone());
    values.insert("Username", row.credential.username.clone());
    values.insert("Password", row.credential.password.clone());
    values
}

/// Fill in one template line; unknown placeholders are left as written
pub fn fill_template(template: &str, values: &HashMap<&'static str, String>) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render one newline-terminated template line per selected row.
///
/// Columns chosen in the selection do not restrict the template.
pub fn render_templated(
    selection: &ExportSelection<'_>,
    template: &str,
) -> Result<String, ExportError> {
    if selection.rows.is_empty() {
        return Err(ExportError::EmptySelection);
    }
    let template = if template.is_empty() {
        DEFAULT_TEMPLATE
    } else {
        template
    };

    let mut output = String::new();
    for row in &selection.rows {
        output.push_str(&fill_template(template, &template_values(row)));
        output.push('\n');
    }
    Ok(output)
}

/// Render the selection in the given mode
pub fn render(selection: &ExportSelection<'_>, mode: &ExportMode) -> Result<String, ExportError> {
    match mode {
        ExportMode::Tabular => render_tabular(selection),
        ExportMode::Templated(template) => render_templated(selection, template),
    }
}

/// Render and write the selection to `path`, returning how many rows were written.
///
/// Nothing is written when the selection is invalid.
pub fn write_export<P: AsRef<Path>>(
    path: P,
    selection: &ExportSelection<'_>,
    mode: &ExportMode,
) -> Result<usize, ExportError> {
    let content = render(selection, mode)?;
    fs::write(path.as_ref(), content)?;
    info!(
        "Exported {} proxies to {:?}",
        selection.rows.len(),
        path.as_ref()
    );
    Ok(selection.rows.len())
}

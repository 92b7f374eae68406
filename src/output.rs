//! Report rendering and persistence.
//!
//! Result rows are any `Serialize` structs. They are rendered in memory to
//! JSON, CSV, HTML, or plain text, and a [`ReportWriter`] then persists a
//! whole run at once: either every file lands or none does.

use anyhow::{Context, Result, bail};
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Serialized rows with the column order of the first row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

impl Table {
    pub fn from_rows<T: Serialize>(rows: &[T]) -> Result<Self> {
        let rows = rows
            .iter()
            .map(|row| -> Result<Map<String, Value>> {
                match serde_json::to_value(row)? {
                    Value::Object(map) => Ok(map),
                    other => bail!("report row is not an object: {other}"),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let columns = rows
            .first()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    fn cells<'a>(&'a self, row: &'a Map<String, Value>) -> impl Iterator<Item = String> + 'a {
        self.columns
            .iter()
            .map(move |c| row.get(c).map_or_else(String::new, cell_text))
    }
}

/// Flat text for one cell. Nested values become compact JSON.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

pub fn render_csv(table: &Table) -> Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    if !table.columns.is_empty() {
        writer.write_record(&table.columns)?;
    }
    for row in &table.rows {
        writer.write_record(table.cells(row))?;
    }
    let bytes = writer.into_inner().context("flushing CSV buffer")?;
    Ok(String::from_utf8(bytes)?)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const HTML_STYLE: &str = "body{font-family:Arial,sans-serif;margin:20px;background:#f5f5f5}\
table{border-collapse:collapse;width:100%;background:#fff}\
th{background:#1976d2;color:#fff;padding:10px;text-align:left}\
td{padding:8px;border-bottom:1px solid #ddd}\
tr:hover{background:#f9f9f9}";

/// A self-contained page with one ranked table per section.
pub fn render_html(title: &str, sections: &[(&str, &Table)]) -> String {
    let title = escape_html(title);
    let mut html = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>{HTML_STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n"
    );
    for (heading, table) in sections {
        if !heading.is_empty() {
            let _ = writeln!(html, "<h2>{}</h2>", escape_html(heading));
        }
        html.push_str("<table>\n<tr><th>Rank</th>");
        for column in &table.columns {
            let _ = write!(html, "<th>{}</th>", escape_html(column));
        }
        html.push_str("</tr>\n");
        for (i, row) in table.rows.iter().enumerate() {
            let _ = write!(html, "<tr><td>{}</td>", i + 1);
            for cell in table.cells(row) {
                let _ = write!(html, "<td>{}</td>", escape_html(&cell));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// One rendered report file, not yet on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFile {
    name: String,
    contents: String,
}

impl ReportFile {
    /// Pretty-printed JSON of `value`.
    pub fn json<T: Serialize + ?Sized>(name: &str, value: &T) -> Result<Self> {
        let mut contents = serde_json::to_string_pretty(value)?;
        contents.push('\n');
        Ok(Self::text(name, contents))
    }

    pub fn csv<T: Serialize>(name: &str, rows: &[T]) -> Result<Self> {
        let contents = render_csv(&Table::from_rows(rows)?)?;
        Ok(Self::text(name, contents))
    }

    pub fn html<T: Serialize>(name: &str, title: &str, rows: &[T]) -> Result<Self> {
        let table = Table::from_rows(rows)?;
        Ok(Self::text(name, render_html(title, &[("", &table)])))
    }

    /// A page with one headed table per `(heading, table)` pair.
    pub fn html_sections(name: &str, title: &str, sections: &[(&str, Table)]) -> Result<Self> {
        let sections: Vec<(&str, &Table)> = sections.iter().map(|(h, t)| (*h, t)).collect();
        Ok(Self::text(name, render_html(title, &sections)))
    }

    pub fn text(name: &str, contents: String) -> Self {
        Self {
            name: name.to_string(),
            contents,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// Persists a run's reports into one directory.
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stages every file as a `.tmp` sibling, then renames them into place.
    /// On any failure the staged and already renamed files of this call are
    /// removed and the error is returned.
    #[tracing::instrument(skip_all, fields(dir = %self.dir.display(), files = files.len()))]
    pub fn write_all(&self, files: &[ReportFile]) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        for file in files {
            if !seen.insert(file.name()) {
                bail!("duplicate report file name '{}'", file.name());
            }
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating output directory {}", self.dir.display()))?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
        for file in files {
            let target = self.dir.join(file.name());
            let tmp = self.dir.join(format!("{}.tmp", file.name()));
            if let Err(e) = fs::write(&tmp, file.contents()) {
                remove_quietly(staged.iter().map(|(t, _)| t.as_path()).chain([tmp.as_path()]));
                return Err(e).with_context(|| format!("writing {}", tmp.display()));
            }
            debug!(file = %tmp.display(), bytes = file.contents().len(), "Staged report");
            staged.push((tmp, target));
        }

        for i in 0..staged.len() {
            let (tmp, target) = &staged[i];
            if let Err(e) = fs::rename(tmp, target) {
                let placed = staged[..i].iter().map(|(_, t)| t.as_path());
                let pending = staged[i..].iter().map(|(t, _)| t.as_path());
                remove_quietly(placed.chain(pending));
                return Err(e).with_context(|| format!("moving report into {}", target.display()));
            }
        }

        let written: Vec<PathBuf> = staged.into_iter().map(|(_, target)| target).collect();
        info!(written = written.len(), "Reports written");
        Ok(written)
    }
}

fn remove_quietly<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(file = %path.display(), error = %e, "Failed to remove partial report");
            }
        }
    }
}

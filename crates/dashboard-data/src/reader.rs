//! Source discovery and loading.
//!
//! Reads CSV files and spreadsheet sheets into [`RawTable`]s, reconciles
//! their schemas and concatenates them into one [`RawDataset`].

use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use dashboard_core::data_processors::format_float_cell;
use dashboard_core::models::{Column, RawDataset, RawTable};
use dashboard_core::{DashboardError, Result};
use tracing::{debug, info, warn};

// ── Input sources ─────────────────────────────────────────────────────────────

/// Tabular format of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    const CSV_EXTENSIONS: &'static [&'static str] = &["csv"];
    const SPREADSHEET_EXTENSIONS: &'static [&'static str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

    /// Infer the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if Self::CSV_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceFormat::Csv)
        } else if Self::SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceFormat::Spreadsheet)
        } else {
            None
        }
    }
}

/// Where the bytes of a source come from.
#[derive(Debug, Clone)]
pub enum SourceContent {
    Path(PathBuf),
    /// An in-memory upload.
    Bytes(Vec<u8>),
}

/// One export to load.
#[derive(Debug, Clone)]
pub struct InputSource {
    /// Label used in logs and errors.
    pub name: String,
    pub format: SourceFormat,
    pub content: SourceContent,
    /// Worksheet name for spreadsheets; the first sheet when `None`.
    pub sheet: Option<String>,
}

impl InputSource {
    /// A file on disk, format taken from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let format = SourceFormat::from_path(path)
            .ok_or_else(|| DashboardError::UnsupportedFormat(path.to_path_buf()))?;
        Ok(Self {
            name: path.display().to_string(),
            format,
            content: SourceContent::Path(path.to_path_buf()),
            sheet: None,
        })
    }

    /// An uploaded comma-delimited text file.
    pub fn csv_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            format: SourceFormat::Csv,
            content: SourceContent::Bytes(bytes.into()),
            sheet: None,
        }
    }

    /// An uploaded workbook.
    pub fn spreadsheet_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            format: SourceFormat::Spreadsheet,
            content: SourceContent::Bytes(bytes.into()),
            sheet: None,
        }
    }

    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all supported export files under `path`, sorted by path.
///
/// A file path is returned as-is when its extension is supported.
pub fn find_source_files(path: &Path) -> Vec<PathBuf> {
    if !path.exists() {
        warn!("Input path does not exist: {}", path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file() && SourceFormat::from_path(entry.path()).is_some()
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Turn CLI paths into sources: directories expand to the exports they
/// contain, files must have a supported extension.
pub fn expand_inputs(paths: &[PathBuf], sheet: Option<&str>) -> Result<Vec<InputSource>> {
    let mut sources = Vec::new();

    for path in paths {
        if path.is_dir() {
            let files = find_source_files(path);
            if files.is_empty() {
                warn!("No exports found in {}", path.display());
            }
            for file in files {
                sources.push(InputSource::from_path(&file)?);
            }
        } else if path.is_file() {
            sources.push(InputSource::from_path(path)?);
        } else {
            return Err(DashboardError::FileRead {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
    }

    Ok(sources
        .into_iter()
        .map(|s| s.with_sheet(sheet.map(str::to_string)))
        .collect())
}

/// Parse one source into a table whose headers are trimmed and which carries
/// the legacy account id column, synthesised as missing when absent.
pub fn read_source(source: &InputSource) -> Result<RawTable> {
    let table = match source.format {
        SourceFormat::Csv => read_csv(source)?,
        SourceFormat::Spreadsheet => read_spreadsheet(source)?,
    };
    conform_table(table)
}

/// Reject header-less tables and synthesise the legacy account id column.
fn conform_table(mut table: RawTable) -> Result<RawTable> {
    if table.columns.is_empty() {
        return Err(malformed(&table.source_name, "no header row"));
    }

    if !table.has_column(Column::LegacyAccountId) {
        debug!(
            "{}: adding missing '{}' column",
            table.source_name,
            Column::LegacyAccountId.header()
        );
        table
            .columns
            .push(Column::LegacyAccountId.header().to_string());
        for row in table.rows.iter_mut() {
            row.push(None);
        }
    }

    debug!(
        "{}: {} columns, {} rows",
        table.source_name,
        table.columns.len(),
        table.rows.len()
    );

    Ok(table)
}

/// Concatenate tables in order under the union of their columns.
///
/// Cells for columns a table lacks are missing. Row order is source order,
/// then row order within each source.
pub fn concat_tables(tables: Vec<RawTable>) -> RawDataset {
    let mut columns: Vec<String> = Vec::new();
    for table in &tables {
        for column in &table.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }

    let total_rows = tables.iter().map(|t| t.rows.len()).sum();
    let mut rows: Vec<Vec<Option<String>>> = Vec::with_capacity(total_rows);
    let mut sources = Vec::with_capacity(tables.len());

    for table in tables {
        let mapping: Vec<Option<usize>> = columns.iter().map(|c| table.column_index(c)).collect();
        for mut row in table.rows {
            let aligned = mapping
                .iter()
                .map(|idx| idx.and_then(|i| row.get_mut(i).and_then(Option::take)))
                .collect();
            rows.push(aligned);
        }
        sources.push(table.source_name);
    }

    RawDataset {
        columns,
        rows,
        sources,
    }
}

/// Load every source into one dataset.
///
/// Fails when a source cannot be parsed or when a required column is absent
/// from all of them; no partial dataset is returned.
pub fn load_sources(sources: &[InputSource]) -> Result<RawDataset> {
    if sources.is_empty() {
        return Err(DashboardError::NoSources);
    }

    let tables = sources
        .iter()
        .map(read_source)
        .collect::<Result<Vec<_>>>()?;

    let dataset = concat_tables(tables);

    for column in Column::REQUIRED {
        if dataset.column_indices(column).is_empty() {
            return Err(DashboardError::MissingColumn(column.header().to_string()));
        }
    }
    for column in Column::DATES {
        if dataset.column_indices(column).is_empty() {
            warn!(
                "No source has a '{}' column; its values are all missing",
                column.header()
            );
        }
    }

    info!(
        "Loaded {} rows with {} columns from {} sources",
        dataset.len(),
        dataset.columns.len(),
        sources.len()
    );

    Ok(dataset)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn malformed(source_name: &str, reason: impl ToString) -> DashboardError {
    DashboardError::MalformedSource {
        source_name: source_name.to_string(),
        reason: reason.to_string(),
    }
}

fn read_csv(source: &InputSource) -> Result<RawTable> {
    match &source.content {
        SourceContent::Path(path) => {
            let file = std::fs::File::open(path).map_err(|e| DashboardError::FileRead {
                path: path.clone(),
                source: e,
            })?;
            parse_csv(&source.name, file)
        }
        SourceContent::Bytes(bytes) => parse_csv(&source.name, bytes.as_slice()),
    }
}

fn parse_csv<R: Read>(name: &str, reader: R) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| malformed(name, e))?
        .iter()
        .enumerate()
        .map(|(i, h)| clean_header(i, h))
        .collect();

    // Short rows are padded with missing cells; extra fields have no
    // column to land in.
    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| malformed(name, e))?;
        if record.len() > columns.len() {
            return Err(malformed(
                name,
                format!(
                    "row {} has {} fields but the header has {}",
                    i + 1,
                    record.len(),
                    columns.len()
                ),
            ));
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
            .collect();
        if row.len() < columns.len() {
            debug!("{}: row {} padded from {} fields", name, i + 1, row.len());
            row.resize(columns.len(), None);
        }
        rows.push(row);
    }

    Ok(RawTable {
        source_name: name.to_string(),
        columns,
        rows,
    })
}

fn read_spreadsheet(source: &InputSource) -> Result<RawTable> {
    let range = match &source.content {
        SourceContent::Path(path) => {
            let mut workbook = open_workbook_auto(path).map_err(|e| malformed(&source.name, e))?;
            sheet_range(&mut workbook, source)?
        }
        SourceContent::Bytes(bytes) => {
            let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.as_slice()))
                .map_err(|e| malformed(&source.name, e))?;
            sheet_range(&mut workbook, source)?
        }
    };

    Ok(table_from_range(&source.name, &range))
}

fn sheet_range<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    source: &InputSource,
) -> Result<Range<Data>> {
    match source.sheet.as_deref() {
        Some(sheet) => workbook
            .worksheet_range(sheet)
            .map_err(|e| malformed(&source.name, e)),
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| malformed(&source.name, "workbook has no sheets"))?
            .map_err(|e| malformed(&source.name, e)),
    }
}

fn table_from_range(name: &str, range: &Range<Data>) -> RawTable {
    let mut rows_iter = range.rows();

    let columns: Vec<String> = rows_iter
        .next()
        .map(|header| {
            header
                .iter()
                .enumerate()
                .map(|(i, cell)| clean_header(i, &cell_text(cell).unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();

    let rows = rows_iter
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    RawTable {
        source_name: name.to_string(),
        columns,
        rows,
    }
}

/// Text of one spreadsheet cell; empty and error cells are missing.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => (!s.is_empty()).then(|| s.clone()),
        Data::Float(f) => Some(format_float_cell(*f)),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format_float_cell(dt.as_f64()),
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Trim a header and name blank ones after their position.
fn clean_header(index: usize, raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        format!("Unnamed: {}", index)
    } else {
        trimmed.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

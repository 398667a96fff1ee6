//! Delimited-text reader producing typed [`Table`]s.
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::data_handling::{Column, Table};

/// Tokens read as a missing cell.
const MISSING_TOKENS: [&str; 9] = ["", "NA", "N/A", "NaN", "nan", "NULL", "null", "None", "n/a"];

/// Keep only rows whose `column` holds one of `allowed`.
#[derive(Debug, Clone)]
pub struct RowFilter {
    pub column: String,
    pub allowed: Vec<String>,
}

/// Options for [`read_table_with`].
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Load only these columns (in file order). Missing ones are an error.
    pub columns: Option<Vec<String>>,
    /// Streaming row filter applied while reading.
    pub row_filter: Option<RowFilter>,
}

fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("pin") => b'\t',
        _ => b',',
    }
}

fn is_missing_token(cell: &str) -> bool {
    let trimmed = cell.trim();
    MISSING_TOKENS.iter().any(|t| *t == trimmed)
}

/// Read a whole CSV/TSV file. `Ok(None)` when the file does not exist.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Option<Table>> {
    read_table_with(path, &ReadOptions::default())
}

/// Read a CSV/TSV file with column projection and row filtering.
///
/// Absence of the file is reported as `Ok(None)` so callers decide whether
/// it is fatal. Malformed content and missing projected columns are errors.
pub fn read_table_with<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Option<Table>> {
    let path = path.as_ref();
    if !path.exists() {
        log::debug!("table not found: {}", path.display());
        return Ok(None);
    }
    let file = File::open(path).with_context(|| format!("Failed to open table: {}", path.display()))?;
    let table = read_table_from_reader(BufReader::new(file), delimiter_for(path), options)
        .with_context(|| format!("Failed to read table: {}", path.display()))?;
    log::debug!(
        "read {} rows x {} columns from {}",
        table.n_rows(),
        table.n_columns(),
        path.display()
    );
    Ok(Some(table))
}

/// Parse delimited text from any reader.
pub fn read_table_from_reader<R: Read>(reader: R, delimiter: u8, options: &ReadOptions) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read header row")?.clone();
    let header_names: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();

    let selected: Vec<usize> = match &options.columns {
        Some(wanted) => {
            let wanted_set: HashSet<&str> = wanted.iter().map(String::as_str).collect();
            let missing: Vec<&str> = wanted
                .iter()
                .map(String::as_str)
                .filter(|w| !header_names.iter().any(|h| h == w))
                .collect();
            if !missing.is_empty() {
                anyhow::bail!("Missing required columns: {}", missing.join(", "));
            }
            (0..header_names.len())
                .filter(|&i| wanted_set.contains(header_names[i].as_str()))
                .collect()
        }
        None => (0..header_names.len()).collect(),
    };

    let filter = match &options.row_filter {
        Some(filter) => {
            let index = header_names
                .iter()
                .position(|h| *h == filter.column)
                .with_context(|| format!("Missing required columns: {}", filter.column))?;
            Some((index, &filter.allowed))
        }
        None => None,
    };

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); selected.len()];
    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Malformed record at data line {}", line + 1))?;
        if let Some((index, allowed)) = filter {
            let value = record.get(index).unwrap_or("").trim();
            if !allowed.iter().any(|a| a == value) {
                continue;
            }
        }
        for (slot, &i) in selected.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            cells[slot].push(if is_missing_token(cell) {
                None
            } else {
                Some(cell.to_string())
            });
        }
    }

    let mut table = Table::new();
    for (slot, column_cells) in cells.into_iter().enumerate() {
        table.push_column(&header_names[selected[slot]], Column::infer(column_cells))?;
    }
    Ok(table)
}

/// Write a table as CSV (or TSV for a `.tsv` path). Missing cells are empty.
pub fn write_table<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    write_table_to(table, file, delimiter_for(path))
        .with_context(|| format!("Failed to write table: {}", path.display()))
}

pub fn write_table_to<W: Write>(table: &Table, writer: W, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    writer.write_record(table.names())?;
    let columns: Vec<&Column> = table.columns().map(|(_, c)| c).collect();
    for row in 0..table.n_rows() {
        let fields = columns.iter().map(|column| match column {
            Column::Numeric(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            Column::Text(v) => v[row].clone().unwrap_or_default(),
        });
        writer.write_record(fields)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_projects_and_filters_rows() {
        let data = "id,status,amount\n1,Fully Paid,100\n2,Current,200\n3,Charged Off,NA\n";
        let options = ReadOptions {
            columns: Some(vec!["amount".into(), "status".into()]),
            row_filter: Some(RowFilter {
                column: "status".into(),
                allowed: vec!["Fully Paid".into(), "Charged Off".into()],
            }),
        };
        let table = read_table_from_reader(data.as_bytes(), b',', &options).unwrap();
        assert_eq!(table.names(), &["status".to_string(), "amount".to_string()]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column("amount"), Some(&Column::Numeric(vec![Some(100.0), None])));
    }

    #[test]
    fn reader_reports_missing_projected_columns() {
        let options = ReadOptions {
            columns: Some(vec!["a".into(), "zzz".into()]),
            row_filter: None,
        };
        let err = read_table_from_reader("a,b\n1,2\n".as_bytes(), b',', &options).unwrap_err();
        assert!(err.to_string().contains("zzz"));
    }
}

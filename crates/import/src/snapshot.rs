//! Flat CSV snapshots written by the sync pipeline.
//!
//! Every write goes to a unique temporary file next to the target and is then
//! renamed over it, so readers see either the old file or the new one.

use std::fs::File;
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::table::{Cell, EvolutionRow, ReportRow, Table};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Could not replace snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),
}

const BOM: char = '\u{feff}';

fn atomic_write<F>(path: &Path, write: F) -> Result<(), SnapshotError>
where
    F: FnOnce(&mut csv::Writer<&mut File>) -> Result<(), SnapshotError>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path)?;
    Ok(())
}

fn cell_field(cell: &Cell) -> &str {
    cell.as_deref().unwrap_or("")
}

fn field_cell(field: &str) -> Cell {
    if field.trim().is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

/// Writes a header row followed by the data rows.
pub fn write_table(path: &Path, table: &Table) -> Result<(), SnapshotError> {
    atomic_write(path, |writer| {
        writer.write_record(&table.headers)?;
        for row in &table.rows {
            writer.write_record(row.iter().map(cell_field))?;
        }
        Ok(())
    })
}

/// Reads a snapshot whose first line is a header. A leading BOM is ignored.
pub fn read_table(path: &Path) -> Result<Table, SnapshotError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches(BOM) } else { h };
            h.to_string()
        })
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(field_cell).collect());
    }

    Ok(Table::new(headers, rows))
}

/// Writes raw rows with no header line.
pub fn write_rows(path: &Path, rows: &[ReportRow]) -> Result<(), SnapshotError> {
    atomic_write(path, |writer| {
        for row in rows {
            writer.write_record(row.iter().map(cell_field))?;
        }
        Ok(())
    })
}

/// Reads raw headerless rows back.
pub fn read_rows(path: &Path) -> Result<Vec<ReportRow>, SnapshotError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(field_cell).collect());
    }
    Ok(rows)
}

/// Writes the `idx,data,valor` evolution snapshot.
pub fn write_evolution(path: &Path, rows: &[EvolutionRow]) -> Result<(), SnapshotError> {
    atomic_write(path, |writer| {
        writer.write_record(["idx", "data", "valor"])?;
        for row in rows {
            writer.write_record([row.idx.to_string().as_str(), row.data.as_str(), row.valor.as_str()])?;
        }
        Ok(())
    })
}

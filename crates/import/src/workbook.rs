use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use caixinha_core::{resolve_sheet, EvolutionLayout, SheetTarget};
use chrono::{NaiveDateTime, Timelike};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::table::{extract_by_position, slice_from_row, EvolutionRow, Matrix, ReportRow, Table};

/// Why a best-effort read produced no data. Logged by callers, never raised
/// past the sync boundary.
#[derive(Debug, Error)]
pub enum Unavailable {
    #[error("Source not found: {0}")]
    MissingSource(PathBuf),
    #[error("Could not copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not open workbook: {0}")]
    Open(#[source] calamine::Error),
    #[error("Workbook has no sheets")]
    NoSheet,
    #[error("Could not read sheet '{sheet}': {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },
    #[error("Sheet '{0}' has no data")]
    EmptySheet(String),
    #[error("No header row containing any of {0:?}")]
    HeaderNotFound(Vec<String>),
    #[error("No usable rows at or after row {0}")]
    NoRows(usize),
    #[error("Snapshot {path} unreadable: {reason}")]
    SnapshotRead { path: PathBuf, reason: String },
    #[error("Snapshot {path} not written: {reason}")]
    SnapshotWrite { path: PathBuf, reason: String },
    #[error("Snapshot {0} is empty")]
    EmptySnapshot(PathBuf),
    #[error("Snapshot {0} has no usable column")]
    NoColumn(PathBuf),
}

/// A private copy of a workbook, deleted when dropped. Each copy gets a
/// unique name so overlapping reads never remove each other's file.
pub struct ScratchCopy {
    file: NamedTempFile,
}

impl ScratchCopy {
    pub fn create(source: &Path, scratch_dir: Option<&Path>) -> Result<Self, Unavailable> {
        if !source.is_file() {
            return Err(Unavailable::MissingSource(source.to_path_buf()));
        }
        // calamine picks the format from the extension, so keep it.
        let suffix = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix(".caixinha-").suffix(&suffix);
        let file = match scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| Unavailable::Copy { path: source.to_path_buf(), source: e })?;

        std::fs::copy(source, file.path())
            .map_err(|e| Unavailable::Copy { path: source.to_path_buf(), source: e })?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Reads workbooks through scratch copies and shapes the result.
#[derive(Debug, Clone, Default)]
pub struct WorkbookExtractor {
    scratch_dir: Option<PathBuf>,
}

impl WorkbookExtractor {
    pub fn new(scratch_dir: Option<PathBuf>) -> Self {
        Self { scratch_dir }
    }

    /// The resolved sheet as an A1-anchored matrix of cell text.
    pub fn read_matrix(&self, path: &Path, target: &SheetTarget) -> Result<Matrix, Unavailable> {
        let copy = ScratchCopy::create(path, self.scratch_dir.as_deref())?;
        let mut workbook = open_workbook_auto(copy.path()).map_err(Unavailable::Open)?;

        let names = workbook.sheet_names();
        let sheet = resolve_sheet(&names, &target.exact, &target.fallback)
            .ok_or(Unavailable::NoSheet)?
            .to_string();
        debug!(workbook = %path.display(), %sheet, "resolved sheet");

        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|source| Unavailable::Sheet { sheet: sheet.clone(), source })?;

        let matrix = anchored_matrix(&range);
        if matrix.iter().all(|row| row.iter().all(Option::is_none)) {
            return Err(Unavailable::EmptySheet(sheet));
        }
        Ok(matrix)
    }

    /// Header-indexed table; the first non-empty row is the header.
    pub fn read_table(&self, path: &Path, target: &SheetTarget) -> Result<Table, Unavailable> {
        let matrix = self.read_matrix(path, target)?;
        Table::from_first_row(matrix).ok_or_else(|| Unavailable::EmptySheet(target.exact.clone()))
    }

    /// Header-indexed table whose header is the first row mentioning a marker.
    pub fn read_table_scanning(
        &self,
        path: &Path,
        target: &SheetTarget,
        markers: &[&str],
    ) -> Result<Table, Unavailable> {
        let matrix = self.read_matrix(path, target)?;
        Table::from_header_scan(matrix, markers)
            .ok_or_else(|| Unavailable::HeaderNotFound(markers.iter().map(|m| m.to_string()).collect()))
    }

    /// Raw rows from one-based `start_row`, empty columns dropped.
    pub fn read_report_rows(
        &self,
        path: &Path,
        target: &SheetTarget,
        start_row: usize,
    ) -> Result<Vec<ReportRow>, Unavailable> {
        let matrix = self.read_matrix(path, target)?;
        let rows = slice_from_row(&matrix, start_row);
        if rows.is_empty() {
            return Err(Unavailable::NoRows(start_row));
        }
        Ok(rows)
    }

    /// Position-based time series, already filtered.
    pub fn read_evolution(
        &self,
        path: &Path,
        target: &SheetTarget,
        layout: &EvolutionLayout,
    ) -> Result<Vec<EvolutionRow>, Unavailable> {
        let matrix = self.read_matrix(path, target)?;
        let rows = extract_by_position(&matrix, layout);
        if rows.is_empty() {
            return Err(Unavailable::NoRows(layout.start_row));
        }
        Ok(rows)
    }
}

/// calamine ranges start at the first used cell; pad so positions are
/// absolute sheet coordinates.
fn anchored_matrix(range: &Range<Data>) -> Matrix {
    let (row0, col0) = range.start().unwrap_or((0, 0));
    let mut matrix: Matrix = vec![Vec::new(); row0 as usize];
    for row in range.rows() {
        let mut cells = vec![None; col0 as usize];
        cells.extend(row.iter().map(cell_text));
        matrix.push(cells);
    }
    matrix
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(render_datetime)
            .or_else(|| Some(cell.to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(e) => Some(e.to_string()),
    }
}

fn render_datetime(dt: NaiveDateTime) -> String {
    if dt.time().num_seconds_from_midnight() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn scratch_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    // ── Scratch copies ────────────────────────────────────────────────────────

    #[test]
    fn scratch_copy_is_unique_and_removed_on_drop() {
        let src_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("Caixinha 2026.xlsx");
        std::fs::write(&source, b"bytes").unwrap();

        let a = ScratchCopy::create(&source, Some(scratch.path())).unwrap();
        let b = ScratchCopy::create(&source, Some(scratch.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().extension().and_then(|e| e.to_str()), Some("xlsx"));
        assert_eq!(std::fs::read(a.path()).unwrap(), b"bytes");
        assert_eq!(scratch_entries(scratch.path()), 2);

        drop(a);
        assert_eq!(scratch_entries(scratch.path()), 1);
        drop(b);
        assert_eq!(scratch_entries(scratch.path()), 0);
        assert!(source.exists());
    }

    #[test]
    fn missing_source_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = WorkbookExtractor::new(Some(dir.path().to_path_buf()));
        let result = extractor.read_matrix(
            &dir.path().join("nope.xlsx"),
            &SheetTarget::new("Base", "base"),
        );
        assert!(matches!(result, Err(Unavailable::MissingSource(_))));
    }

    #[test]
    fn corrupt_workbook_is_unavailable_and_cleaned_up() {
        let src_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("Relatorio.xlsx");
        std::fs::write(&source, b"not a zip archive").unwrap();

        let extractor = WorkbookExtractor::new(Some(scratch.path().to_path_buf()));
        let result = extractor.read_report_rows(&source, &SheetTarget::new("Base", "base"), 4);
        assert!(matches!(result, Err(Unavailable::Open(_))));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    // ── Cell conversion ───────────────────────────────────────────────────────

    #[test]
    fn anchored_matrix_pads_to_a1() {
        let mut range: Range<Data> = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("Data".into()));
        range.set_value((2, 2), Data::String("Caixinha".into()));
        range.set_value((3, 2), Data::Float(1234.5));

        let matrix = anchored_matrix(&range);
        assert_eq!(matrix.len(), 4);
        assert!(matrix[0].is_empty());
        assert_eq!(matrix[2], vec![None, Some("Data".into()), Some("Caixinha".into())]);
        assert_eq!(matrix[3], vec![None, None, Some("1234.5".into())]);
    }

    #[test]
    fn cell_text_variants() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::String("  ".into())), None);
        assert_eq!(cell_text(&Data::Int(7)), Some("7".into()));
        assert_eq!(cell_text(&Data::Float(10.0)), Some("10".into()));
        assert_eq!(cell_text(&Data::DateTimeIso("2026-02-02".into())), Some("2026-02-02".into()));
    }

    #[test]
    fn datetime_rendering() {
        let midnight = chrono::NaiveDate::from_ymd_opt(2026, 2, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(render_datetime(midnight), "2026-02-02");
        let later = midnight.with_hour(9).unwrap();
        assert_eq!(render_datetime(later), "2026-02-02 09:00:00");
    }

    // ── Fixture workbook ──────────────────────────────────────────────────────

    /// Sheets "Resumo", "Participantes" (header at B2) and "Base" (title at
    /// C2, report header at row 4, series at rows 190-194 in E and U).
    fn fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/caixinha.xlsx")
    }

    fn text(cells: &[&str]) -> Vec<Cell> {
        cells
            .iter()
            .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
            .collect()
    }

    #[test]
    fn reads_named_sheet_anchored_at_a1() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = WorkbookExtractor::new(Some(scratch.path().to_path_buf()));

        let matrix = extractor
            .read_matrix(&fixture(), &SheetTarget::new("participantes", "particip"))
            .unwrap();
        assert!(matrix[0].is_empty());
        assert_eq!(matrix[1], text(&["", "Nome", "CPF", "Saldo Atual", "Aplicado"]));
        assert_eq!(matrix[2], text(&["", "Ana", "123.456.789-01", "1234.5", "1000"]));
        assert_eq!(matrix[3], text(&["", "Bia", "98765432100", "500", ""]));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[test]
    fn sheet_resolution_falls_back_to_substring_then_first() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = WorkbookExtractor::new(Some(scratch.path().to_path_buf()));

        let base = extractor
            .read_matrix(&fixture(), &SheetTarget::new("planilha principal", "base"))
            .unwrap();
        assert_eq!(base[3][0].as_deref(), Some("Data"));

        let first = extractor
            .read_matrix(&fixture(), &SheetTarget::new("inexistente", "nada"))
            .unwrap();
        assert_eq!(first[0][0].as_deref(), Some("Resumo da caixinha"));
    }

    #[test]
    fn roster_table_from_workbook() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = WorkbookExtractor::new(Some(scratch.path().to_path_buf()));

        let table = extractor
            .read_table(&fixture(), &SheetTarget::new("participantes", "particip"))
            .unwrap();
        assert_eq!(table.headers, vec!["col_1", "Nome", "CPF", "Saldo Atual", "Aplicado"]);
        assert_eq!(table.len(), 2);

        let members = table.members();
        assert_eq!(members[0].cpf, "12345678901");
        assert_eq!(members[0].nome, "Ana");
        assert_eq!(members[1].cpf, "98765432100");
        assert_eq!(members[1].columns["Saldo Atual"], "500");
    }

    #[test]
    fn header_scan_skips_title_rows() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = WorkbookExtractor::new(Some(scratch.path().to_path_buf()));

        let table = extractor
            .read_table_scanning(&fixture(), &SheetTarget::new("Base", "base"), &["caixinha 2026"])
            .unwrap();
        assert_eq!(table.headers[..2], ["Data".to_string(), "Caixinha 2026".to_string()]);
        assert_eq!(table.cell(1, 1), Some("1.050,25"));
    }

    #[test]
    fn report_rows_start_at_sheet_row_and_drop_empty_columns() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = WorkbookExtractor::new(Some(scratch.path().to_path_buf()));

        let rows = extractor
            .read_report_rows(&fixture(), &SheetTarget::new("Base", "base"), 4)
            .unwrap();
        assert_eq!(rows.len(), 191);
        assert_eq!(rows[0], text(&["Data", "Caixinha 2026", "", ""]));
        assert_eq!(rows[1], text(&["02/03/2026", "1000", "", ""]));
        assert_eq!(rows[2], text(&["03/03/2026", "1.050,25", "", ""]));
        assert_eq!(rows[187], text(&["", "", "1000", "02/02/2026"]));
        assert!(rows.iter().all(|row| row.len() == 4));
    }

    #[test]
    fn evolution_series_at_fixed_coordinates() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = WorkbookExtractor::new(Some(scratch.path().to_path_buf()));

        let rows = extractor
            .read_evolution(&fixture(), &SheetTarget::new("Base", "base"), &EvolutionLayout::default())
            .unwrap();
        assert_eq!(
            rows,
            vec![
                EvolutionRow { idx: 191, data: "02/02/2026".into(), valor: "1000".into() },
                EvolutionRow { idx: 192, data: "03/02/2026".into(), valor: "1.200,50".into() },
            ]
        );
        assert_eq!(scratch_entries(scratch.path()), 0);
    }
}

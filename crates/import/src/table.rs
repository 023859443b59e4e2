use std::collections::BTreeMap;

use caixinha_core::dates::parse_day_first;
use caixinha_core::{find_column_index, normalize, normalize_cpf, EvolutionLayout, MemberRecord};
use serde::{Deserialize, Serialize};

/// A cell's text; `None` marks an empty cell.
pub type Cell = Option<String>;
/// Raw cells of one sheet row, without a schema.
pub type ReportRow = Vec<Cell>;
/// A whole sheet anchored at A1: `matrix[0][0]` is cell A1.
pub type Matrix = Vec<ReportRow>;

/// A header-indexed table. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(Option::is_some))
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Uses the first row with any content as the header.
    pub fn from_first_row(matrix: Matrix) -> Option<Self> {
        let header_idx = matrix.iter().position(|row| row.iter().any(Option::is_some))?;
        Some(Self::split_at_header(matrix, header_idx))
    }

    /// Uses the first row where any cell contains one of `markers`
    /// (accent/case-insensitive) as the header.
    pub fn from_header_scan(matrix: Matrix, markers: &[&str]) -> Option<Self> {
        let markers: Vec<String> = markers
            .iter()
            .map(|m| normalize(m))
            .filter(|m| !m.is_empty())
            .collect();
        let header_idx = matrix.iter().position(|row| {
            row.iter().flatten().any(|cell| {
                let cell = normalize(cell);
                markers.iter().any(|m| cell.contains(m.as_str()))
            })
        })?;
        Some(Self::split_at_header(matrix, header_idx))
    }

    fn split_at_header(mut matrix: Matrix, header_idx: usize) -> Self {
        let data = matrix.split_off(header_idx + 1);
        let header_row = matrix.pop().unwrap_or_default();
        let headers = header_row
            .iter()
            .enumerate()
            .map(|(i, cell)| header_name(cell.as_deref(), i))
            .collect();
        Self::new(headers, data)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn find_column(&self, candidates: &[&str]) -> Option<usize> {
        find_column_index(&self.headers, candidates)
    }

    /// Index of the column named exactly `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// The last `limit` rows, or all rows when `limit` is `None`.
    pub fn tail(&self, limit: Option<usize>) -> &[Vec<Cell>] {
        match limit {
            Some(n) => &self.rows[self.rows.len().saturating_sub(n)..],
            None => &self.rows,
        }
    }

    /// Roster rows as member records. Rows without a usable cpf are skipped.
    pub fn members(&self) -> Vec<MemberRecord> {
        let Some(cpf_col) = self.find_column(&["cpf"]) else {
            return Vec::new();
        };
        let nome_col = self.find_column(&["nome"]);

        self.rows
            .iter()
            .filter_map(|row| {
                let cpf = normalize_cpf(row.get(cpf_col)?.as_deref()?)?;
                let nome = nome_col
                    .and_then(|c| row.get(c))
                    .and_then(Option::as_deref)
                    .map(|n| n.trim().to_string())
                    .unwrap_or_default();
                let columns = self
                    .headers
                    .iter()
                    .zip(row)
                    .enumerate()
                    .filter(|(i, _)| *i != cpf_col && Some(*i) != nome_col)
                    .map(|(_, (h, cell))| (h.clone(), cell.clone().unwrap_or_default()))
                    .collect::<BTreeMap<_, _>>();
                Some(MemberRecord { cpf, nome, columns })
            })
            .collect()
    }
}

fn header_name(cell: Option<&str>, idx: usize) -> String {
    match cell.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("col_{}", idx + 1),
    }
}

/// Rows from one-based `start_row` onward, with columns that are empty in
/// every remaining row removed.
pub fn slice_from_row(matrix: &Matrix, start_row: usize) -> Vec<ReportRow> {
    let slice = matrix.get(start_row.saturating_sub(1)..).unwrap_or_default();
    let width = slice.iter().map(Vec::len).max().unwrap_or(0);
    let keep: Vec<usize> = (0..width)
        .filter(|&col| slice.iter().any(|row| matches!(row.get(col), Some(Some(_)))))
        .collect();

    slice
        .iter()
        .map(|row| keep.iter().map(|&col| row.get(col).cloned().flatten()).collect())
        .collect()
}

/// One row of the position-based time series, as persisted in the
/// evolution snapshot (`idx,data,valor`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionRow {
    /// One-based sheet row number.
    pub idx: usize,
    pub data: String,
    pub valor: String,
}

/// Reads the series at fixed coordinates, ignoring headers.
///
/// A row survives only if its date parses (day-first) to the cutoff or
/// later and its value cell is present and not `nan`.
pub fn extract_by_position(matrix: &Matrix, layout: &EvolutionLayout) -> Vec<EvolutionRow> {
    let start = layout.start_row.saturating_sub(1);
    let value_col = layout.value_column.saturating_sub(1);
    let date_col = layout.date_column.saturating_sub(1);

    matrix
        .iter()
        .enumerate()
        .skip(start)
        .filter_map(|(i, row)| {
            let valor = row.get(value_col)?.as_deref()?.trim();
            if valor.is_empty() || valor.eq_ignore_ascii_case("nan") {
                return None;
            }
            let data = row.get(date_col)?.as_deref()?.trim();
            let date = parse_day_first(data)?;
            if date < layout.cutoff {
                return None;
            }
            Some(EvolutionRow {
                idx: i + 1,
                data: data.to_string(),
                valor: valor.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(cells: &[&str]) -> ReportRow {
        cells
            .iter()
            .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
            .collect()
    }

    // ── Header discovery ──────────────────────────────────────────────────────

    #[test]
    fn first_row_header_skips_leading_blank_rows() {
        let matrix = vec![
            row(&["", ""]),
            row(&["CPF", "Saldo Atual", ""]),
            row(&["123", "10,00"]),
            row(&["", ""]),
            row(&["456", "20,00", "extra"]),
        ];
        let table = Table::from_first_row(matrix).unwrap();
        assert_eq!(table.headers, vec!["CPF", "Saldo Atual", "col_3"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1), Some("10,00"));
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.cell(1, 2), Some("extra"));
    }

    #[test]
    fn first_row_header_on_blank_matrix_is_none() {
        assert!(Table::from_first_row(vec![row(&["", ""])]).is_none());
        assert!(Table::from_first_row(Vec::new()).is_none());
    }

    #[test]
    fn header_scan_finds_marker_row() {
        let matrix = vec![
            row(&["Relatório mensal"]),
            row(&[""]),
            row(&["Data", "Aplicado", "CAIXINHA 2026"]),
            row(&["02/02/2026", "100", "1.000,00"]),
        ];
        let table = Table::from_header_scan(matrix, &["caixinha 2026"]).unwrap();
        assert_eq!(table.headers[2], "CAIXINHA 2026");
        assert_eq!(table.len(), 1);
        assert_eq!(table.find_column(&["caixinha"]), Some(2));
    }

    #[test]
    fn header_scan_without_marker_is_none() {
        let matrix = vec![row(&["Data", "Valor"]), row(&["1", "2"])];
        assert!(Table::from_header_scan(matrix, &["caixinha"]).is_none());
    }

    #[test]
    fn tail_limits_from_the_end() {
        let rows = (1..=10).map(|i| vec![Some(i.to_string())]).collect();
        let table = Table::new(vec!["n".to_string()], rows);
        let last: Vec<_> = table.tail(Some(3)).iter().map(|r| r[0].clone().unwrap()).collect();
        assert_eq!(last, vec!["8", "9", "10"]);
        assert_eq!(table.tail(None).len(), 10);
        assert_eq!(table.tail(Some(50)).len(), 10);
    }

    #[test]
    fn members_normalize_cpf_and_keep_other_columns() {
        let matrix = vec![
            row(&["Nome", "CPF do Sócio", "Saldo Atual"]),
            row(&["Ana", "123.456.789-01", "10"]),
            row(&["Sem cpf", "", "5"]),
            row(&["Bia", "987654321", ""]),
        ];
        let members = Table::from_first_row(matrix).unwrap().members();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].cpf, "12345678901");
        assert_eq!(members[0].nome, "Ana");
        assert_eq!(members[0].columns.get("Saldo Atual").map(String::as_str), Some("10"));
        assert_eq!(members[1].cpf, "00987654321");
        assert_eq!(members[1].columns.get("Saldo Atual").map(String::as_str), Some(""));
    }

    // ── Direct slice ──────────────────────────────────────────────────────────

    #[test]
    fn slice_starts_at_one_based_row_and_drops_empty_columns() {
        let matrix = vec![
            row(&["title", "", "", "x"]),
            row(&[""]),
            row(&[""]),
            row(&["Data", "", "Caixinha"]),
            row(&["02/02/2026", "", "10"]),
        ];
        let rows = slice_from_row(&matrix, 4);
        assert_eq!(rows, vec![row(&["Data", "Caixinha"]), row(&["02/02/2026", "10"])]);
    }

    #[test]
    fn slice_past_end_is_empty() {
        let matrix = vec![row(&["a"])];
        assert!(slice_from_row(&matrix, 4).is_empty());
    }

    // ── Position-based extraction ─────────────────────────────────────────────

    fn layout() -> EvolutionLayout {
        EvolutionLayout {
            start_row: 3,
            value_column: 1,
            date_column: 2,
            cutoff: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
        }
    }

    #[test]
    fn position_extraction_filters_rows() {
        let matrix = vec![
            row(&["ignored", "02/02/2026"]),
            row(&["ignored", "02/02/2026"]),
            row(&["100,00", "01/02/2026"]),
            row(&["110,00", "02/02/2026"]),
            row(&["nan", "03/02/2026"]),
            row(&["", "04/02/2026"]),
            row(&["130,00", "sem data"]),
            row(&["140,00", ""]),
            row(&["150,00", "2026-03-01 00:00:00"]),
        ];
        let rows = extract_by_position(&matrix, &layout());
        assert_eq!(
            rows,
            vec![
                EvolutionRow { idx: 4, data: "02/02/2026".into(), valor: "110,00".into() },
                EvolutionRow { idx: 9, data: "2026-03-01 00:00:00".into(), valor: "150,00".into() },
            ]
        );
    }

    #[test]
    fn position_extraction_on_short_matrix_is_empty() {
        let matrix = vec![row(&["1", "02/02/2026"]); 189];
        assert!(extract_by_position(&matrix, &EvolutionLayout::default()).is_empty());
    }

    #[test]
    fn position_extraction_on_narrow_matrix_is_empty() {
        let matrix = vec![row(&["1", "02/02/2026"]); 200];
        assert!(extract_by_position(&matrix, &EvolutionLayout::default()).is_empty());
    }
}

//! Where the fund's time series comes from.
//!
//! Sources are tried in priority order; the first one that can be read is
//! used as-is, even if none of its values parse.

use caixinha_core::{parse_decimal, EvolutionPoint};
use caixinha_import::{snapshot, Cell, Table, Unavailable};

use crate::pipeline::SyncPipeline;

pub trait EvolutionSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// The last `limit` rows (all when `None`), minus rows whose value does
    /// not parse.
    fn load(&self, pipeline: &SyncPipeline, limit: Option<usize>)
        -> Result<Vec<EvolutionPoint>, Unavailable>;
}

/// Report snapshot, then a fresh position-based extraction, then whatever
/// evolution snapshot a previous sync left behind.
pub fn default_sources() -> Vec<Box<dyn EvolutionSource>> {
    vec![
        Box::new(ReportSnapshot),
        Box::new(FreshExtraction),
        Box::new(StaleSnapshot),
    ]
}

/// The report snapshot, with its header found by scanning for the fund
/// column's markers.
pub struct ReportSnapshot;

impl EvolutionSource for ReportSnapshot {
    fn name(&self) -> &'static str {
        "report snapshot"
    }

    fn load(
        &self,
        pipeline: &SyncPipeline,
        limit: Option<usize>,
    ) -> Result<Vec<EvolutionPoint>, Unavailable> {
        let settings = pipeline.settings();
        let path = settings.report_path();
        if !path.is_file() {
            return Err(Unavailable::MissingSource(path));
        }
        let rows = snapshot::read_rows(&path)
            .map_err(|e| Unavailable::SnapshotRead { path: path.clone(), reason: e.to_string() })?;

        let markers = settings.report_markers();
        let table = Table::from_header_scan(rows, &markers).ok_or_else(|| {
            Unavailable::HeaderNotFound(settings.report_markers.clone())
        })?;
        if table.is_empty() {
            return Err(Unavailable::EmptySnapshot(path));
        }
        let value_col = table.find_column(&markers).ok_or(Unavailable::NoColumn(path))?;
        let date_col = table.find_column(&["data"]);

        Ok(points(table.tail(limit), value_col, date_col))
    }
}

/// Re-extracts the series from the report workbook at its fixed coordinates.
/// Also refreshes the evolution snapshot.
pub struct FreshExtraction;

impl EvolutionSource for FreshExtraction {
    fn name(&self) -> &'static str {
        "workbook extraction"
    }

    fn load(
        &self,
        pipeline: &SyncPipeline,
        limit: Option<usize>,
    ) -> Result<Vec<EvolutionPoint>, Unavailable> {
        let rows = pipeline.refresh_evolution()?;
        let start = limit.map_or(0, |n| rows.len().saturating_sub(n));
        Ok(rows[start..]
            .iter()
            .filter_map(|row| Some(EvolutionPoint::new(row.data.trim(), parse_decimal(&row.valor)?)))
            .collect())
    }
}

/// The evolution snapshot from an earlier successful sync.
pub struct StaleSnapshot;

impl EvolutionSource for StaleSnapshot {
    fn name(&self) -> &'static str {
        "evolution snapshot"
    }

    fn load(
        &self,
        pipeline: &SyncPipeline,
        limit: Option<usize>,
    ) -> Result<Vec<EvolutionPoint>, Unavailable> {
        let path = pipeline.settings().evolution_path();
        if !path.is_file() {
            return Err(Unavailable::MissingSource(path));
        }
        let table = snapshot::read_table(&path)
            .map_err(|e| Unavailable::SnapshotRead { path: path.clone(), reason: e.to_string() })?;
        if table.is_empty() {
            return Err(Unavailable::EmptySnapshot(path));
        }
        let value_col = table.column("valor").ok_or(Unavailable::NoColumn(path))?;
        let date_col = table.column("data");

        Ok(points(table.tail(limit), value_col, date_col))
    }
}

fn points(rows: &[Vec<Cell>], value_col: usize, date_col: Option<usize>) -> Vec<EvolutionPoint> {
    rows.iter()
        .filter_map(|row| {
            let valor = parse_decimal(row.get(value_col)?.as_deref()?)?;
            let data = date_col
                .and_then(|c| row.get(c))
                .and_then(|cell| cell.as_deref())
                .unwrap_or("")
                .trim();
            Some(EvolutionPoint::new(data, valor))
        })
        .collect()
}

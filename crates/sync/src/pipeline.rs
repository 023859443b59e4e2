use std::path::PathBuf;

use caixinha_core::{normalize_cpf, parse_decimal, BalanceView, EvolutionPoint, Settings};
use caixinha_import::{snapshot, Cell, EvolutionRow, Table, Unavailable, WorkbookExtractor};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::evolution::{default_sources, EvolutionSource};

const CPF_COLUMN: &[&str] = &["cpf"];
const NOME_COLUMN: &[&str] = &["nome"];
const ATUAL_COLUMN: &[&str] = &["atual", "saldo atual", "saldo_atual", "saldo"];
const APLICADO_COLUMN: &[&str] = &["aplicado"];

/// Everything the member dashboard shows, gathered in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub nome: Option<String>,
    pub balances: Option<BalanceView>,
    pub evolution: Vec<EvolutionPoint>,
    pub report_synced: bool,
}

/// Column positions the balance lookup needs.
struct BalanceColumns {
    cpf: usize,
    atual: usize,
    aplicado: Option<usize>,
}

impl BalanceColumns {
    fn resolve(table: &Table) -> Option<Self> {
        Some(Self {
            cpf: table.find_column(CPF_COLUMN)?,
            atual: table.find_column(ATUAL_COLUMN)?,
            aplicado: table.find_column(APLICADO_COLUMN),
        })
    }
}

/// Logs why a best-effort step produced nothing and collapses it to `None`.
fn available<T>(result: Result<T, Unavailable>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(reason) => {
            warn!(%reason, "{what} unavailable");
            None
        }
    }
}

/// The text at `col`, or `None` when the row is short or the cell blank.
fn cell(row: &[Cell], col: usize) -> Option<&str> {
    row.get(col).and_then(Option::as_deref)
}

fn snapshot_write(path: PathBuf, err: snapshot::SnapshotError) -> Unavailable {
    Unavailable::SnapshotWrite { path, reason: err.to_string() }
}

/// Turns the spreadsheets into CSV snapshots and answers queries from them.
///
/// Every public operation is best-effort: failures are logged and surface as
/// `None` or an empty list, never as a panic.
pub struct SyncPipeline {
    settings: Settings,
    extractor: WorkbookExtractor,
    sources: Vec<Box<dyn EvolutionSource>>,
}

impl SyncPipeline {
    pub fn new(settings: Settings) -> Self {
        Self::with_sources(settings, default_sources())
    }

    /// Uses `sources` for `get_evolution`, tried in the given order.
    pub fn with_sources(settings: Settings, sources: Vec<Box<dyn EvolutionSource>>) -> Self {
        let extractor = WorkbookExtractor::new(settings.scratch_dir.clone());
        Self { settings, extractor, sources }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Spreadsheet → snapshot ────────────────────────────────────────────────

    pub(crate) fn refresh_members(&self) -> Result<Table, Unavailable> {
        let table = self
            .extractor
            .read_table(&self.settings.members_workbook, &self.settings.members_sheet)?;
        let path = self.settings.roster_path();
        snapshot::write_table(&path, &table).map_err(|e| snapshot_write(path, e))?;
        info!(rows = table.len(), "member roster synced");
        Ok(table)
    }

    pub(crate) fn refresh_report(&self) -> Result<PathBuf, Unavailable> {
        let rows = self.extractor.read_report_rows(
            &self.settings.report_workbook,
            &self.settings.report_sheet,
            self.settings.report_start_row,
        )?;
        let path = self.settings.report_path();
        snapshot::write_rows(&path, &rows).map_err(|e| snapshot_write(path.clone(), e))?;
        info!(rows = rows.len(), "report synced");
        Ok(path)
    }

    pub(crate) fn refresh_evolution(&self) -> Result<Vec<EvolutionRow>, Unavailable> {
        let rows = self.extractor.read_evolution(
            &self.settings.report_workbook,
            &self.settings.report_sheet,
            &self.settings.evolution,
        )?;
        let path = self.settings.evolution_path();
        snapshot::write_evolution(&path, &rows).map_err(|e| snapshot_write(path, e))?;
        info!(points = rows.len(), "evolution synced");
        Ok(rows)
    }

    /// Re-reads the members workbook and rewrites the roster snapshot.
    pub fn sync_members(&self) -> Option<Table> {
        available(self.refresh_members(), "member roster")
    }

    /// Re-reads the report workbook and rewrites the report snapshot.
    pub fn sync_report(&self) -> Option<PathBuf> {
        available(self.refresh_report(), "report")
    }

    /// Extracts the position-based series and rewrites the evolution snapshot.
    pub fn sync_evolution(&self) -> Option<Vec<EvolutionRow>> {
        available(self.refresh_evolution(), "evolution series")
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    fn read_roster(&self) -> Option<Table> {
        let path = self.settings.roster_path();
        if !path.is_file() {
            return None;
        }
        match snapshot::read_table(&path) {
            Ok(table) if !table.is_empty() => Some(table),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "roster snapshot unreadable");
                None
            }
        }
    }

    /// Balances for `cpf`. Reads the roster snapshot, rebuilding it from the
    /// workbook when it is missing, empty, or lacks the needed columns.
    pub fn get_balances(&self, cpf: &str) -> Option<BalanceView> {
        let cpf = normalize_cpf(cpf)?;

        let mut table = match self.read_roster() {
            Some(table) => table,
            None => self.sync_members()?,
        };
        let columns = match BalanceColumns::resolve(&table) {
            Some(columns) => columns,
            None => {
                debug!("roster lacks cpf or balance columns; resyncing");
                table = self.sync_members()?;
                let Some(columns) = BalanceColumns::resolve(&table) else {
                    warn!(headers = ?table.headers, "roster has no cpf or balance column");
                    return None;
                };
                columns
            }
        };

        let mut matches = table.rows.iter().filter(|row| {
            cell(row, columns.cpf).and_then(normalize_cpf).as_deref() == Some(cpf.as_str())
        });
        let row = matches.next()?;
        if matches.next().is_some() {
            warn!("cpf appears more than once in the roster; using the first row");
        }

        let atual = cell(row, columns.atual).and_then(parse_decimal)?;
        let aplicado = columns
            .aplicado
            .and_then(|col| cell(row, col))
            .and_then(parse_decimal);
        Some(BalanceView::new(atual, aplicado))
    }

    /// The member's name from the roster snapshot, when present.
    pub fn member_name(&self, cpf: &str) -> Option<String> {
        let cpf = normalize_cpf(cpf)?;
        let table = self.read_roster()?;
        let cpf_col = table.find_column(CPF_COLUMN)?;
        let nome_col = table.find_column(NOME_COLUMN)?;
        table
            .rows
            .iter()
            .find(|row| cell(row, cpf_col).and_then(normalize_cpf).as_deref() == Some(cpf.as_str()))
            .and_then(|row| cell(row, nome_col))
            .map(|nome| nome.trim().to_string())
            .filter(|nome| !nome.is_empty())
    }

    /// The fund's time series, oldest first. `limit` keeps only the last N
    /// points; `None` or zero keeps all. Sources are tried in order and the
    /// first usable one wins, even if it yields nothing.
    pub fn get_evolution(&self, limit: Option<usize>) -> Vec<EvolutionPoint> {
        let limit = limit.filter(|n| *n > 0);
        for source in &self.sources {
            match source.load(self, limit) {
                Ok(points) => {
                    debug!(source = source.name(), points = points.len(), "evolution source used");
                    return points;
                }
                Err(reason) => {
                    debug!(source = source.name(), %reason, "evolution source unusable");
                }
            }
        }
        warn!("no evolution source available");
        Vec::new()
    }

    /// Name, balances and full series for one member, then a report refresh.
    pub fn refresh_dashboard(&self, cpf: &str) -> DashboardSnapshot {
        let nome = self.member_name(cpf);
        self.sync_members();
        let balances = self.get_balances(cpf);
        let evolution = self.get_evolution(None);
        let report_synced = self.sync_report().is_some();
        DashboardSnapshot { nome, balances, evolution, report_synced }
    }
}

/// Reads a `limit` query value. Anything but a positive integer means "all".
pub fn parse_limit(text: &str) -> Option<usize> {
    text.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

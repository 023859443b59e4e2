use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV: &str = "CAIXINHA_CONFIG";
pub const BASE_DIR_ENV: &str = "CAIXINHA_BASE_DIR";

pub const ROSTER_FILE: &str = "informacoes.csv";
pub const REPORT_FILE: &str = "relatorio.csv";
pub const EVOLUTION_FILE: &str = "evolucao_caixinha.csv";
pub const CHARGES_FILE: &str = "encargos.csv";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How a sheet is located in a workbook: exact normalized name, then a
/// substring, then the first sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetTarget {
    pub exact: String,
    pub fallback: String,
}

impl SheetTarget {
    pub fn new(exact: &str, fallback: &str) -> Self {
        Self { exact: exact.to_string(), fallback: fallback.to_string() }
    }
}

/// Fixed coordinates of the fund's time series in the "Base" sheet.
/// Rows and columns are one-based sheet positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionLayout {
    pub start_row: usize,
    pub value_column: usize,
    pub date_column: usize,
    /// Rows dated before this are dropped.
    pub cutoff: NaiveDate,
}

impl Default for EvolutionLayout {
    fn default() -> Self {
        Self {
            start_row: 190,
            value_column: 5,
            date_column: 21,
            cutoff: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap_or_default(),
        }
    }
}

/// Process-wide configuration. Built once at startup and handed to every
/// component; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub members_workbook: PathBuf,
    pub report_workbook: PathBuf,
    pub snapshot_dir: PathBuf,
    /// Loan rules file. `<snapshot_dir>/encargos.csv` when unset.
    pub charges_file: Option<PathBuf>,
    /// Where per-call workbook copies are made. System temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
    pub members_sheet: SheetTarget,
    pub report_sheet: SheetTarget,
    /// One-based row where the report slice starts.
    pub report_start_row: usize,
    /// Header tokens that identify the fund column in the report snapshot.
    pub report_markers: Vec<String>,
    pub evolution: EvolutionLayout,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_base_dir(Path::new("."))
    }
}

impl Settings {
    pub fn for_base_dir(base: &Path) -> Self {
        let snapshot_dir = base.join("csv");
        Self {
            members_workbook: base.join("Caixinha 2026.xlsx"),
            report_workbook: base.join("Relatorio.xlsx"),
            snapshot_dir,
            charges_file: None,
            scratch_dir: None,
            members_sheet: SheetTarget::new("participantes", "particip"),
            report_sheet: SheetTarget::new("Base", "base"),
            report_start_row: 4,
            report_markers: vec![
                "caixinha 2026".to_string(),
                "caixinha2026".to_string(),
                "caixinha".to_string(),
            ],
            evolution: EvolutionLayout::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// `CAIXINHA_CONFIG` names a TOML file; otherwise `CAIXINHA_BASE_DIR`
    /// (or the working directory) supplies the default layout.
    pub fn from_env() -> Result<Self, SettingsError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        let base = std::env::var_os(BASE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::for_base_dir(&base))
    }

    pub fn roster_path(&self) -> PathBuf {
        self.snapshot_dir.join(ROSTER_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.snapshot_dir.join(REPORT_FILE)
    }

    pub fn evolution_path(&self) -> PathBuf {
        self.snapshot_dir.join(EVOLUTION_FILE)
    }

    pub fn charges_path(&self) -> PathBuf {
        self.charges_file
            .clone()
            .unwrap_or_else(|| self.snapshot_dir.join(CHARGES_FILE))
    }

    pub fn report_markers(&self) -> Vec<&str> {
        self.report_markers.iter().map(String::as_str).collect()
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let positions = [
            ("report_start_row", self.report_start_row),
            ("evolution.start_row", self.evolution.start_row),
            ("evolution.value_column", self.evolution.value_column),
            ("evolution.date_column", self.evolution.date_column),
        ];
        for (field, value) in positions {
            if value == 0 {
                return Err(SettingsError::Invalid {
                    field,
                    reason: "positions are one-based".to_string(),
                });
            }
        }
        if self.report_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(SettingsError::Invalid {
                field: "report_markers",
                reason: "at least one marker is required".to_string(),
            });
        }
        Ok(())
    }
}

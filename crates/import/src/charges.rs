use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use caixinha_core::dates::{canonicalize, to_br, to_iso};
use caixinha_core::money::{fixed_two, parse_percentage};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const JUROS_MENSAL: &str = "juros_mensal";
pub const MAX_DATA: &str = "max_data";
pub const MAX_PARCELAS: &str = "max_parcelas";
pub const MAX_VALOR_PERC: &str = "max_valor_perc";

pub const REQUIRED_KEYS: [&str; 4] = [JUROS_MENSAL, MAX_DATA, MAX_PARCELAS, MAX_VALOR_PERC];

/// Loan rules errors are always surfaced; the rules gate money.
#[derive(Debug, Error)]
pub enum ChargesError {
    #[error("Charges file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read charges file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse charges file: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required fields in charges file: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Invalid {field} in charges file: '{value}'")]
    Invalid { field: &'static str, value: String },
}

/// The loan rules table, validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargesConfig {
    /// Monthly interest, percent, two decimals.
    pub juros_mensal: Decimal,
    pub max_data: NaiveDate,
    pub max_parcelas: u32,
    /// Percent of the invested balance that may be borrowed on top of it.
    pub max_valor_perc: Decimal,
    /// Keys beyond the required four, as written.
    pub extras: BTreeMap<String, String>,
}

impl ChargesConfig {
    /// Validates a `chave → valor` map. Partial configs are rejected.
    pub fn from_entries(mut entries: BTreeMap<String, String>) -> Result<Self, ChargesError> {
        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| entries.get(**key).map_or(true, |v| v.trim().is_empty()))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ChargesError::MissingFields(missing));
        }

        let mut take = |key: &str| entries.remove(key).unwrap_or_default().trim().to_string();
        let juros_raw = take(JUROS_MENSAL);
        let parcelas_raw = take(MAX_PARCELAS);
        let perc_raw = take(MAX_VALOR_PERC);
        let data_raw = take(MAX_DATA);

        let juros_mensal = parse_fixed_percentage(&juros_raw).ok_or(ChargesError::Invalid {
            field: JUROS_MENSAL,
            value: juros_raw.clone(),
        })?;

        let digits: String = parcelas_raw.chars().filter(char::is_ascii_digit).collect();
        let max_parcelas = digits
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ChargesError::Invalid { field: MAX_PARCELAS, value: parcelas_raw.clone() })?;

        let max_valor_perc = parse_fixed_percentage(&perc_raw).ok_or(ChargesError::Invalid {
            field: MAX_VALOR_PERC,
            value: perc_raw.clone(),
        })?;

        let max_data = canonicalize(&data_raw)
            .ok_or(ChargesError::Invalid { field: MAX_DATA, value: data_raw.clone() })?;

        Ok(Self {
            juros_mensal,
            max_data,
            max_parcelas,
            max_valor_perc,
            extras: entries,
        })
    }

    /// Parses the text of a charges file.
    pub fn from_csv_str(content: &str) -> Result<Self, ChargesError> {
        Self::from_entries(read_entries(content)?)
    }

    /// The full `chave → valor` map in canonical form: `4.08`,
    /// `2026-11-10`, `12`, `20.00`, plus any extra keys.
    pub fn canonical(&self) -> BTreeMap<String, String> {
        let mut map = self.extras.clone();
        map.insert(JUROS_MENSAL.to_string(), fixed_two(self.juros_mensal));
        map.insert(MAX_DATA.to_string(), to_iso(self.max_data));
        map.insert(MAX_PARCELAS.to_string(), self.max_parcelas.to_string());
        map.insert(MAX_VALOR_PERC.to_string(), fixed_two(self.max_valor_perc));
        map
    }

    pub fn max_data_display(&self) -> String {
        to_br(self.max_data)
    }
}

/// Loads and validates the charges file at `path`.
pub fn load_charges_config(path: &Path) -> Result<ChargesConfig, ChargesError> {
    if !path.is_file() {
        return Err(ChargesError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    ChargesConfig::from_csv_str(&content)
}

fn parse_fixed_percentage(text: &str) -> Option<Decimal> {
    let mut value = parse_percentage(text)?.round_dp(2);
    value.rescale(2);
    Some(value)
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "_")
}

/// Occurrences of `delim` outside double quotes.
fn count_unquoted(line: &str, delim: char) -> usize {
    let mut quoted = false;
    line.chars()
        .filter(|&c| {
            if c == '"' {
                quoted = !quoted;
            }
            !quoted && c == delim
        })
        .count()
}

/// A delimiter that appears the same non-zero number of times on every
/// non-empty line wins, `;` checked first. Otherwise the first line decides
/// and a tie goes to `;`.
fn detect_delimiter(content: &str) -> u8 {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let consistent = |delim: char| {
        let mut counts = lines.iter().map(|line| count_unquoted(line, delim));
        let first = counts.next().unwrap_or(0);
        first > 0 && counts.all(|n| n == first)
    };
    if consistent(';') {
        return b';';
    }
    if consistent(',') {
        return b',';
    }

    let first = lines.first().copied().unwrap_or("");
    let semicolons = count_unquoted(first, ';');
    if semicolons > 0 && semicolons >= count_unquoted(first, ',') {
        b';'
    } else {
        b','
    }
}

/// Reads raw `chave → valor` pairs.
///
/// With a `chave`/`valor` header (any casing) those columns are used.
/// Otherwise each row's first two non-empty cells form the pair.
pub fn read_entries(content: &str) -> Result<BTreeMap<String, String>, ChargesError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(content))
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        records.push(result?);
    }

    let header = records.first().map(|first| {
        let find = |name: &str| first.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        (find("chave"), find("valor"))
    });

    let mut entries = BTreeMap::new();
    match header {
        Some((Some(key_col), value_col)) => {
            for record in records.iter().skip(1) {
                let key = record.get(key_col).unwrap_or_default();
                let value = value_col.and_then(|c| record.get(c)).unwrap_or_default();
                if !key.trim().is_empty() {
                    entries.insert(normalize_key(key), value.trim().to_string());
                }
            }
        }
        _ => {
            for record in &records {
                let mut cells = record.iter().filter(|c| !c.trim().is_empty());
                if let (Some(key), Some(value)) = (cells.next(), cells.next()) {
                    entries.insert(normalize_key(key), value.trim().to_string());
                }
            }
        }
    }

    Ok(entries)
}

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dates::parse_day_first;
use crate::money::{format_currency, format_currency_opt};

pub const CPF_DIGITS: usize = 11;

fn re_non_digit() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\D").expect("invalid regex"))
}

/// Keeps digits only and left-pads to 11. Longer values are kept as-is.
pub fn normalize_cpf(raw: &str) -> Option<String> {
    let digits = re_non_digit().replace_all(raw, "");
    if digits.is_empty() {
        return None;
    }
    Some(format!("{digits:0>width$}", width = CPF_DIGITS))
}

/// One roster row, keyed by normalized cpf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub cpf: String,
    pub nome: String,
    /// Every other roster column, keyed by its header as written.
    pub columns: BTreeMap<String, String>,
}

/// A member's balances. Each amount comes with its currency display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub atual: Decimal,
    pub atual_display: String,
    pub aplicado: Option<Decimal>,
    pub aplicado_display: Option<String>,
    /// `atual - aplicado`, only when `aplicado` is known.
    pub variacao: Option<Decimal>,
    pub variacao_display: Option<String>,
}

impl BalanceView {
    pub fn new(atual: Decimal, aplicado: Option<Decimal>) -> Self {
        let variacao = aplicado.map(|aplicado| atual - aplicado);
        Self {
            atual,
            atual_display: format_currency(atual),
            aplicado,
            aplicado_display: format_currency_opt(aplicado),
            variacao,
            variacao_display: format_currency_opt(variacao),
        }
    }
}

/// One point of the fund's time series, in spreadsheet row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionPoint {
    /// Date as written in the source; free-form when it does not parse.
    pub data: String,
    pub valor: Decimal,
}

impl EvolutionPoint {
    pub fn new(data: impl Into<String>, valor: Decimal) -> Self {
        Self { data: data.into(), valor }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        parse_day_first(&self.data)
    }
}

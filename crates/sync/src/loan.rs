use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use caixinha_core::dates::{parse_iso, to_br};
use caixinha_core::money::{format_currency, format_decimal_br};
use caixinha_core::BalanceView;
use caixinha_import::charges::{JUROS_MENSAL, MAX_DATA, MAX_PARCELAS, MAX_VALOR_PERC};
use caixinha_import::{load_charges_config, ChargesConfig, ChargesError};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::pipeline::SyncPipeline;

const DEFAULT_JUROS_DISPLAY: &str = "4,08";
const DEFAULT_MAX_PERC_DISPLAY: &str = "20,00";
const DEFAULT_MAX_DATA: &str = "2026-11-10";

/// Looks up a member's balances. Implemented by the sync pipeline; tests
/// substitute a fixed table.
pub trait BalanceSource {
    fn balances(&self, cpf: &str) -> Option<BalanceView>;
}

impl BalanceSource for SyncPipeline {
    fn balances(&self, cpf: &str) -> Option<BalanceView> {
        self.get_balances(cpf)
    }
}

/// The loan ceiling for one member, with the rules used to compute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanQuote {
    pub amount_display: String,
    pub amount_raw: Decimal,
    pub juros_mensal_display: String,
    pub max_valor_perc_display: String,
    pub max_data_display: String,
    pub max_parcelas: Option<u32>,
    /// The canonical charges map the quote was computed from.
    pub encargos: BTreeMap<String, String>,
}

/// What the loan page shows: the member's name next to their quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanOffer {
    pub nome: Option<String>,
    #[serde(flatten)]
    pub quote: LoanQuote,
}

pub struct LoanCalculator<B: BalanceSource> {
    balances: B,
    charges_file: PathBuf,
}

impl<B: BalanceSource> LoanCalculator<B> {
    pub fn new(balances: B, charges_file: PathBuf) -> Self {
        Self { balances, charges_file }
    }

    pub fn balances(&self) -> &B {
        &self.balances
    }

    pub fn load_charges_config(&self) -> Result<ChargesConfig, ChargesError> {
        load_charges_config(&self.charges_file)
    }

    /// The most `cpf` may borrow: the invested balance, at cent precision,
    /// plus the configured percentage of it. Unknown members and unknown
    /// invested balances count as zero. Charges problems are errors.
    pub fn max_loan(&self, cpf: &str) -> Result<LoanQuote, ChargesError> {
        let encargos = self.load_charges_config()?.canonical();
        let aplicado = self
            .balances
            .balances(cpf)
            .and_then(|view| view.aplicado)
            .map(|aplicado| aplicado.round_dp(2))
            .unwrap_or(Decimal::ZERO);
        debug!(%aplicado, "computing loan ceiling");
        Ok(quote(aplicado, encargos))
    }
}

impl LoanCalculator<SyncPipeline> {
    /// The loan page flow: name from the roster as it stands, then a roster
    /// refresh from the members workbook, then the quote on fresh balances.
    pub fn refresh_loan(&self, cpf: &str) -> Result<LoanOffer, ChargesError> {
        let nome = self.balances.member_name(cpf);
        self.balances.sync_members();
        let quote = self.max_loan(cpf)?;
        Ok(LoanOffer { nome, quote })
    }
}

/// Computes a quote from a canonical charges map. Each display field falls
/// back to its default when the map value does not parse.
pub fn quote(aplicado: Decimal, encargos: BTreeMap<String, String>) -> LoanQuote {
    let decimal = |key: &str| encargos.get(key).and_then(|v| Decimal::from_str(v.trim()).ok());

    let max_perc = decimal(MAX_VALOR_PERC);
    let perc = max_perc.unwrap_or(Decimal::from(20));
    let amount = aplicado * (Decimal::ONE + perc / Decimal::ONE_HUNDRED);

    let juros_mensal_display = decimal(JUROS_MENSAL)
        .map(format_decimal_br)
        .unwrap_or_else(|| DEFAULT_JUROS_DISPLAY.to_string());
    let max_valor_perc_display = max_perc
        .map(format_decimal_br)
        .unwrap_or_else(|| DEFAULT_MAX_PERC_DISPLAY.to_string());

    let raw_date = encargos.get(MAX_DATA).map_or(DEFAULT_MAX_DATA, |v| v.trim());
    let max_data_display = parse_iso(raw_date).map(to_br).unwrap_or_else(|| raw_date.to_string());

    let max_parcelas = encargos.get(MAX_PARCELAS).and_then(|v| v.trim().parse().ok());

    LoanQuote {
        amount_display: format_currency(amount),
        amount_raw: amount,
        juros_mensal_display,
        max_valor_perc_display,
        max_data_display,
        max_parcelas,
        encargos,
    }
}

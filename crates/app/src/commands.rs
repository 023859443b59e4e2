use anyhow::Context;
use caixinha_sync::{parse_limit, LoanCalculator, SyncPipeline};
use serde_json::{json, Value};

pub fn sync_members(pipeline: &SyncPipeline) -> Value {
    match pipeline.sync_members() {
        Some(table) => json!({ "synced": true, "rows": table.len(), "members": table.members().len() }),
        None => json!({ "synced": false }),
    }
}

pub fn sync_report(pipeline: &SyncPipeline) -> Value {
    match pipeline.sync_report() {
        Some(path) => json!({ "synced": true, "path": path.display().to_string() }),
        None => json!({ "synced": false }),
    }
}

pub fn sync_evolution(pipeline: &SyncPipeline) -> Value {
    match pipeline.sync_evolution() {
        Some(rows) => json!({ "synced": true, "rows": rows }),
        None => json!({ "synced": false }),
    }
}

pub fn balances(pipeline: &SyncPipeline, cpf: &str) -> Value {
    json!(pipeline.get_balances(cpf))
}

pub fn name(pipeline: &SyncPipeline, cpf: &str) -> Value {
    json!({ "nome": pipeline.member_name(cpf) })
}

pub fn evolution(pipeline: &SyncPipeline, limit: Option<&str>) -> Value {
    json!(pipeline.get_evolution(limit.and_then(parse_limit)))
}

/// Charges problems are fatal: the command fails instead of printing defaults.
pub fn charges(pipeline: &SyncPipeline) -> anyhow::Result<Value> {
    let path = pipeline.settings().charges_path();
    let config = caixinha_import::load_charges_config(&path)
        .with_context(|| format!("loading charges from {}", path.display()))?;
    Ok(json!({
        "encargos": config.canonical(),
        "max_data_display": config.max_data_display(),
    }))
}

/// Name, roster refresh and ceiling, in the loan page's order.
pub fn loan(pipeline: SyncPipeline, cpf: &str) -> anyhow::Result<Value> {
    let charges_file = pipeline.settings().charges_path();
    let calculator = LoanCalculator::new(pipeline, charges_file);
    let offer = calculator.refresh_loan(cpf).context("computing loan ceiling")?;
    Ok(json!(offer))
}

pub fn dashboard(pipeline: &SyncPipeline, cpf: &str) -> Value {
    json!(pipeline.refresh_dashboard(cpf))
}

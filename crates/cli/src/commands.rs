//! Command implementations for the correction workflow.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rowmend_client::{ApiError, EtlClient};
use rowmend_engine::{
    identity, save_row, EngineError, EntityType, ResultStore, RowId, SaveOutcome,
    SessionController,
};
use rowmend_protocol::Record;

use crate::exit_codes;
use crate::snapshot;
use crate::CliError;

fn usage(msg: impl Into<String>) -> CliError {
    CliError { code: exit_codes::EXIT_USAGE, message: msg.into(), hint: None }
}

fn parse_entity(value: &str) -> Result<EntityType, CliError> {
    EntityType::parse(value).ok_or_else(|| {
        usage(format!(
            "unknown entity '{value}' (expected books, customers, orders, carts or invoices)"
        ))
    })
}

// ── status ──────────────────────────────────────────────────────────

pub fn cmd_status(snapshot_path: PathBuf, json: bool, list_errors: bool) -> Result<(), CliError> {
    let store = snapshot::load_store(&snapshot_path, EntityType::Books)?;
    let summary = store.summary();

    if json {
        let value = serde_json::json!({
            "summary": summary,
            "entities": store.entities().map(|e| e.to_string()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return Ok(());
    }

    println!("passed:  {}", summary.passed);
    println!("fixed:   {}", summary.fixed);
    println!("failed:  {}", summary.failed);
    println!("fixable: {}", summary.fixable);
    println!("total:   {}", summary.total);

    if list_errors {
        for entity in EntityType::ALL {
            let errors = store.errors(entity);
            if errors.is_empty() {
                continue;
            }
            println!("\n{entity} ({} invalid):", errors.len());
            for (i, row) in errors.iter().enumerate() {
                let id = identity::resolve(row, i);
                println!("  row {id}");
                for e in row.errors() {
                    println!("    {} [{}] {}", e.field, e.rule, e.message);
                }
            }
        }
    }
    Ok(())
}

// ── fix ─────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_fix(
    snapshot_path: PathBuf,
    row: Option<String>,
    index: Option<usize>,
    entity: Option<String>,
    sets: Vec<String>,
    api_base: String,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let row_id = match (row, index) {
        (Some(key), None) => RowId::Key(key),
        (None, Some(i)) => RowId::Index(i),
        _ => return Err(usage("exactly one of --row or --index is required")),
    };

    let edits = parse_sets(&sets)?;
    if edits.is_empty() {
        return Err(usage("at least one --set field=value is required"));
    }

    let mut store = snapshot::load_store(&snapshot_path, EntityType::Books)?;
    let (entity, idx) = locate_row(&store, &row_id, entity.as_deref())?;
    let record = store.errors(entity)[idx].clone();

    let mut controller = SessionController::new();
    controller
        .begin_edit(entity, &record, idx, 0.0)
        .map_err(engine_err)?;
    for (field, value) in &edits {
        controller.edit_field(field, value).map_err(engine_err)?;
    }

    let client = EtlClient::new(api_base);
    let outcome = save_row(&mut store, &mut controller, &client).map_err(engine_err)?;

    let out_path = output.unwrap_or(snapshot_path);
    snapshot::write_store(&out_path, &store)?;

    match outcome {
        SaveOutcome::Fixed => {
            let s = store.summary();
            println!("row {row_id} moved to transformed ({} invalid left)", s.failed);
            Ok(())
        }
        SaveOutcome::StillInvalid { remaining } => {
            let mut message =
                format!("row {row_id} is still invalid ({remaining} error(s) remain)");
            for e in &controller.session().map(|s| s.active_errors.clone()).unwrap_or_default() {
                message.push_str(&format!("\n  {} [{}] {}", e.field, e.rule, e.message));
            }
            Err(CliError {
                code: exit_codes::EXIT_STILL_INVALID,
                message,
                hint: Some("re-run fix with a new value for the flagged field(s)".into()),
            })
        }
        // save_row is synchronous; its verdict cannot be stale.
        SaveOutcome::Stale => Err(CliError {
            code: exit_codes::EXIT_ERROR,
            message: "verdict did not match the submitted row".into(),
            hint: None,
        }),
    }
}

fn parse_sets(sets: &[String]) -> Result<Vec<(String, String)>, CliError> {
    sets.iter()
        .map(|s| {
            s.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| usage(format!("--set '{s}' is not of the form field=value")))
        })
        .collect()
}

/// Find the erroring row, searching one entity when given, all otherwise.
fn locate_row(
    store: &ResultStore,
    row_id: &RowId,
    entity: Option<&str>,
) -> Result<(EntityType, usize), CliError> {
    let candidates: Vec<EntityType> = match entity {
        Some(name) => vec![parse_entity(name)?],
        None => EntityType::ALL.to_vec(),
    };
    for entity in candidates {
        if let Some(idx) = store.find_error(entity, row_id) {
            return Ok((entity, idx));
        }
    }
    Err(CliError {
        code: exit_codes::EXIT_ROW_NOT_FOUND,
        message: format!("row {row_id} not found in any errors bucket"),
        hint: Some("run `rowmend status --errors` to list invalid rows".into()),
    })
}

fn engine_err(e: EngineError) -> CliError {
    let code = match &e {
        EngineError::Validation { .. } => exit_codes::EXIT_GATE,
        EngineError::Network(_) => exit_codes::EXIT_NETWORK,
        EngineError::Anomaly { .. } => exit_codes::EXIT_ANOMALY,
        EngineError::RowNotFound { .. } => exit_codes::EXIT_ROW_NOT_FOUND,
        EngineError::SaveInFlight { .. } | EngineError::NoSession => exit_codes::EXIT_ERROR,
    };
    let hint = match &e {
        EngineError::Network(_) => {
            Some("backend unreachable; re-run the same command to retry".into())
        }
        EngineError::Anomaly { .. } => {
            Some("the backend returned no outcome for the row; reload the dataset".into())
        }
        _ => None,
    };
    CliError { code, message: e.to_string(), hint }
}

// ── export ──────────────────────────────────────────────────────────

pub fn cmd_export(
    snapshot_path: PathBuf,
    output: PathBuf,
    api_base: String,
    local: bool,
) -> Result<(), CliError> {
    let store = snapshot::load_store(&snapshot_path, EntityType::Books)?;
    refuse_if_errors(&store, "export")?;

    let rows = store.all_rows();
    if local {
        write_local_csv(&rows, &output)?;
    } else {
        let client = EtlClient::new(api_base);
        let bytes = client.save_csv(&rows).map_err(api_err)?;
        std::fs::write(&output, bytes).map_err(|e| CliError {
            code: exit_codes::EXIT_IO,
            message: format!("cannot write {}: {}", output.display(), e),
            hint: None,
        })?;
    }
    println!("exported {} rows to {}", rows.len(), output.display());
    Ok(())
}

/// Offline export: union of visible field names as header, stringified
/// values, reserved keys excluded.
fn write_local_csv(rows: &[Record], output: &Path) -> Result<(), CliError> {
    let io_err = |e: String| CliError {
        code: exit_codes::EXIT_IO,
        message: format!("cannot write {}: {}", output.display(), e),
        hint: None,
    };

    let columns: BTreeSet<String> = rows
        .iter()
        .flat_map(|r| r.field_names().map(String::from))
        .collect();

    let mut writer = csv::Writer::from_path(output).map_err(|e| io_err(e.to_string()))?;
    writer
        .write_record(columns.iter())
        .map_err(|e| io_err(e.to_string()))?;
    for row in rows {
        let values: Vec<String> = columns
            .iter()
            .map(|c| row.field_str(c).unwrap_or_default())
            .collect();
        writer.write_record(&values).map_err(|e| io_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| io_err(e.to_string()))
}

// ── load ────────────────────────────────────────────────────────────

pub fn cmd_load(snapshot_path: PathBuf, api_base: String) -> Result<(), CliError> {
    let store = snapshot::load_store(&snapshot_path, EntityType::Books)?;
    refuse_if_errors(&store, "load")?;

    let client = EtlClient::new(api_base);
    let loaded = client.load_to_source().map_err(api_err)?;
    println!("loaded into source database:");
    println!("  customers: {}", loaded.customers);
    println!("  books:     {}", loaded.books);
    println!("  orders:    {}", loaded.orders);
    println!("  total:     {}", loaded.total);
    Ok(())
}

fn refuse_if_errors(store: &ResultStore, action: &str) -> Result<(), CliError> {
    let failed = store.total_errors();
    if failed > 0 {
        return Err(CliError {
            code: exit_codes::EXIT_ERRORS_REMAIN,
            message: format!("{failed} invalid row(s) remain; {action} refused"),
            hint: Some("fix the remaining rows first (`rowmend status --errors`)".into()),
        });
    }
    Ok(())
}

fn api_err(e: ApiError) -> CliError {
    let code = match &e {
        ApiError::Network(_) | ApiError::Timeout(_) => exit_codes::EXIT_NETWORK,
        ApiError::Parse(_) => exit_codes::EXIT_PARSE,
        ApiError::Http(..) | ApiError::Validation(_) => exit_codes::EXIT_ERROR,
    };
    let hint = match &e {
        ApiError::Timeout(_) => {
            Some("the pipeline may still be running; check the backend before retrying".into())
        }
        _ => None,
    };
    CliError { code, message: e.to_string(), hint }
}

// ── Tests ───────────────────────────────────────────────────────────

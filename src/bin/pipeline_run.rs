//! Scheduling Pipeline CLI
//!
//! Harness for exercising the APS pipeline end-to-end without the
//! excluded HTTP/Excel/MES layers: reads decade-plan rows from a JSON
//! file, runs the pipeline against file- or sqlite-backed reference
//! data, and writes the resulting work-order pairs as JSON.
//!
//! Usage:
//!   cargo run --release --bin pipeline_run -- run --plans plans.json --out orders.json
//!   cargo run --release --bin pipeline_run -- run --plans plans.json --sequence-db seq.sqlite3

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use aps_scheduling_pipeline::aps::reference::{InMemoryReferenceData, MaintenanceWindow, ShiftConfig};
use aps_scheduling_pipeline::aps::sequence::{InMemorySequenceAllocator, SequenceAllocator, SqliteSequenceAllocator};
use aps_scheduling_pipeline::aps::{CancellationToken, DecadePlanRow, PipelineConfig, PipelineRunner};
use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "pipeline_run")]
#[command(about = "Run the scheduling pipeline over a decade-plan batch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline over one import batch.
    Run {
        /// Path to a JSON file containing an array of DecadePlanRow.
        #[arg(long)]
        plans: PathBuf,

        /// Optional reference-data fixture (shifts, maintenance, relations).
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Path to write the resulting work-order pairs as JSON.
        #[arg(long)]
        out: Option<PathBuf>,

        /// SQLite path for a durable sequence allocator. In-memory if omitted.
        #[arg(long)]
        sequence_db: Option<PathBuf>,

        /// Import batch identifier (defaults to the plans file stem).
        #[arg(long)]
        batch_id: Option<String>,
    },
}

#[derive(Debug, Deserialize, Default)]
struct ReferenceFixture {
    #[serde(default)]
    shift_config: Vec<ShiftConfig>,
    #[serde(default)]
    maintenance_plans: Vec<MaintenanceWindow>,
    #[serde(default)]
    machine_relations: HashMap<String, Vec<String>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            plans,
            reference,
            out,
            sequence_db,
            batch_id,
        } => run(plans, reference, out, sequence_db, batch_id),
    }
}

fn run(
    plans_path: PathBuf,
    reference_path: Option<PathBuf>,
    out_path: Option<PathBuf>,
    sequence_db: Option<PathBuf>,
    batch_id: Option<String>,
) -> Result<()> {
    let batch_id = batch_id.unwrap_or_else(|| {
        plans_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("batch")
            .to_string()
    });

    let plans_json = fs::read_to_string(&plans_path)
        .with_context(|| format!("reading plans file {}", plans_path.display()))?;
    let rows: Vec<DecadePlanRow> =
        serde_json::from_str(&plans_json).context("parsing decade plan rows")?;

    let fixture = match reference_path {
        Some(path) => {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("reading reference fixture {}", path.display()))?;
            serde_json::from_str(&contents).context("parsing reference fixture")?
        }
        None => ReferenceFixture::default(),
    };

    let reference_data = InMemoryReferenceData::new()
        .with_decade_plans(batch_id.clone(), rows)
        .with_shift_config(fixture.shift_config)
        .with_maintenance_plans(fixture.maintenance_plans)
        .with_machine_relations(fixture.machine_relations);

    let allocator: Box<dyn SequenceAllocator> = match sequence_db {
        Some(path) => Box::new(SqliteSequenceAllocator::open(path)?),
        None => Box::new(InMemorySequenceAllocator::new()),
    };

    let config = PipelineConfig::from_env();
    let runner = PipelineRunner::new(&reference_data, allocator.as_ref(), config);
    let token = CancellationToken::new();

    let result = runner.run(&batch_id, &token)?;
    tracing::info!(
        status = ?result.status,
        work_orders = result.work_orders.len(),
        "run finished"
    );

    let wire_pairs: Vec<_> = result
        .work_orders
        .iter()
        .map(|p| serde_json::json!({
            "feeding": p.feeding.to_mes_wire(),
            "packing": p.packing.to_mes_wire(),
        }))
        .collect();

    let output_json = serde_json::to_string_pretty(&wire_pairs)?;
    match out_path {
        Some(path) => fs::write(&path, output_json)
            .with_context(|| format!("writing output to {}", path.display()))?,
        None => println!("{}", output_json),
    }

    Ok(())
}

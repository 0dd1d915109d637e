//! Main application entry point (CLI binary).
//!
//! Thin wrapper around the `bulk_ingest` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Feeding template records through the pipeline and printing the outcome

use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use bulk_ingest::initialization::{init_logger_with, init_store};
use bulk_ingest::{count_rows, fetch_resource, Opt, Pipeline, Template};

#[tokio::main]
async fn main() -> Result<()> {
    // BULK_INGEST_DB_PATH and BULK_INGEST_MAX_CONNECTIONS may come from .env
    let _ = dotenvy::dotenv();

    let opt = Opt::parse();
    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    if let Err(e) = run(opt).await {
        eprintln!("bulk_ingest error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(opt: Opt) -> Result<()> {
    let template = Template::load(&opt.template)?;
    let store = opt.store_config();
    let config = opt.pipeline_config();
    let table = config.table.clone();

    let pool = init_store(&store, &config, !opt.keep_table)
        .await
        .context("Failed to prepare the store")?;
    let pipeline = Pipeline::start(pool.clone(), config).context("Failed to start pipeline")?;

    println!(
        "Loading {} clusters of {} resources into {}",
        opt.clusters,
        template.len(),
        store.db_path.display()
    );

    let start = Instant::now();
    let mut last_uid = None;
    for i in 0..opt.clusters {
        let cluster = format!("cluster-{i}");
        for record in template.records_for_cluster(&cluster) {
            last_uid = Some(record.uid.clone());
            pipeline
                .submit(record)
                .await
                .with_context(|| format!("Failed to submit a record for {cluster}"))?;
        }
        log::debug!("Submitted {}", cluster);
    }
    let report = pipeline.close().await;
    let insert_time = start.elapsed();

    println!("{}", report);
    for e in report.errors.iter().take(10) {
        eprintln!("  {}", e);
    }
    println!(
        "Insert time: {:.2}s ({:.0} records/s)",
        insert_time.as_secs_f64(),
        report.throughput()
    );

    // The last uid submitted must be readable once close() returns
    if let Some(uid) = last_uid {
        let lookup = Instant::now();
        let found = fetch_resource(&pool, &table, &uid)
            .await
            .context("Failed to look up the last record")?;
        println!(
            "Lookup of {}: {} in {:.1}ms",
            uid,
            if found.is_some() { "found" } else { "missing" },
            lookup.elapsed().as_secs_f64() * 1000.0
        );
    }

    let counting = Instant::now();
    let rows = count_rows(&pool, &table)
        .await
        .context("Failed to count rows")?;
    println!(
        "Rows in {}: {} (counted in {:.1}ms)",
        table,
        rows,
        counting.elapsed().as_secs_f64() * 1000.0
    );

    pool.close().await;
    if !report.is_clean() {
        process::exit(2);
    }
    Ok(())
}

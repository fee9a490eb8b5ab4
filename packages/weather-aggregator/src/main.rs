//! Aggregator process entry point: parse CLI flags, bootstrap from disk,
//! then serve connections and the expiry sweep until shutdown.

use std::sync::Arc;

use clap::Parser;
use weather_aggregator::{bootstrap, expiry, network, shutdown, Args, AggregatorError, RecordStore};

#[tokio::main]
async fn main() -> Result<(), AggregatorError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };
    let policy = args.expiry_policy();

    let store = Arc::new(RecordStore::new(args.data_dir.clone()));
    let clock = Arc::new(bootstrap::run(&store).await?);

    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    tokio::spawn(shutdown::wait_for_signal(Arc::clone(&shutdown_notify)));

    let expiry_task = tokio::spawn(expiry::run(
        Arc::clone(&store),
        Arc::clone(&clock),
        policy,
        Arc::clone(&shutdown_notify),
    ));

    network::serve(args.port, store, clock, policy, Arc::clone(&shutdown_notify)).await?;
    let _ = expiry_task.await;
    Ok(())
}

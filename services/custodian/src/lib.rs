//! Custodian Service
//!
//! Trusted custodian bridging a main ledger and a side ledger:
//! - Peg-in watcher: observes payments into the custodian account
//! - Export watcher: records exports into the custodian's side-ledger contract
//! - Peg-out engine: pays exporters on the main ledger
//! - Finalizer: retires or repays exported value on the side ledger
//!
//! # Architecture
//!
//! ```text
//!  main ledger                         side ledger
//!      │                                    │
//! ┌────▼─────┐                        ┌─────▼─────┐
//! │ Peg-in   │                        │  Export   │
//! │ watcher  │                        │  watcher  │
//! └────┬─────┘                        └─────┬─────┘
//!      │ pegs              exports table    │ exports signal
//!      ▼                                    ▼
//!  ┌───────┐                          ┌──────────┐  queue + sweep  ┌───────────┐
//!  │ Store │◄─────────────────────────┤ Peg-out  ├────────────────►│ Finalizer │
//!  └───────┘                          │ engine   │                 └───────────┘
//!                                     └──────────┘
//! ```
//!
//! All four tasks share one `Custodian`. The first task to fail cancels
//! the others and its error is returned from `run`.

pub mod backoff;
pub mod config;
pub mod context;
pub mod error;
pub mod export_tx;
pub mod export_watcher;
pub mod finalizer;
pub mod ledger;
pub mod mock;
pub mod pegin_watcher;
pub mod pegout;
pub mod pin;
pub mod signal;

pub use config::CustodianConfig;
pub use context::Custodian;
pub use error::{CustodianError, CustodianResult};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const SERVICE_VERSION: &str = "0.1.0";

/// Run every custodian task until `cancel` fires or one of them fails.
pub async fn run(custodian: Arc<Custodian>, cancel: CancellationToken) -> CustodianResult<()> {
    let (completed_tx, completed_rx) = mpsc::channel(custodian.config.pegout_queue_capacity);
    info!(
        version = SERVICE_VERSION,
        account = %custodian.account,
        "Custodian starting"
    );

    let mut tasks = JoinSet::new();
    tasks.spawn(pegin_watcher::watch_pegins(custodian.clone(), cancel.clone()));
    tasks.spawn(export_watcher::watch_exports(custodian.clone(), cancel.clone()));
    tasks.spawn(pegout::run_pegout_engine(
        custodian.clone(),
        completed_tx,
        cancel.clone(),
    ));
    tasks.spawn(finalizer::run_finalizer(
        custodian.clone(),
        completed_rx,
        cancel.clone(),
    ));

    let mut result = Ok(());
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| CustodianError::Task(e.to_string()))
            .and_then(|r| r);
        if let Err(e) = outcome {
            error!(error = %e, "Custodian task failed, shutting down");
            cancel.cancel();
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    info!("Custodian stopped");
    result
}

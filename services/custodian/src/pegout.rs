//! Peg-Out Engine — main-ledger payments for recorded exports
//!
//! Wakes on the exports signal (and on a timer while retry-state records
//! exist), submits the pre-authorized peg-out transaction for every
//! not-yet or retry record, and stores the outcome:
//!
//! ```text
//! submitted          -> ok
//! rejected bad seq   -> retry
//! any other failure  -> fail
//! ```
//!
//! Each state change is a guarded update that must affect exactly one row.
//! Records that reach ok or fail are forwarded to the finalizer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use persistence::ExportRow;
use types::amount::format_amount;
use types::ids::TxId;
use types::pegout::{ExportRecord, PegOutState};
use types::transaction::TransactionResultCode;

use crate::context::Custodian;
use crate::error::{CustodianError, CustodianResult};
use crate::export_tx::pegout_tx_for;
use crate::ledger::{SubmitError, SubmitResult};

/// Map a submission outcome to the record's next state.
pub fn classify(result: &Result<SubmitResult, SubmitError>) -> PegOutState {
    match result {
        Ok(_) => PegOutState::Ok,
        Err(SubmitError::Rejected {
            code: TransactionResultCode::TxBadSeq,
        }) => PegOutState::Retry,
        Err(_) => PegOutState::Fail,
    }
}

/// Run until cancelled. Errors returned are fatal.
pub async fn run_pegout_engine(
    custodian: Arc<Custodian>,
    completed: mpsc::Sender<TxId>,
    cancel: CancellationToken,
) -> CustodianResult<()> {
    let mut exports = custodian.signals.exports.subscribe();
    let mut retry_timer = tokio::time::interval(custodian.config.retry_interval());
    retry_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("Peg-out engine started");

    // records left by a previous run
    let mut retry_pending = process_pending(&custodian, &completed).await?;
    retry_timer.reset();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Peg-out engine stopped");
                return Ok(());
            }
            alive = exports.wait() => {
                if !alive {
                    info!("Exports signal closed, peg-out engine stopping");
                    return Ok(());
                }
            }
            _ = retry_timer.tick(), if retry_pending => {
                debug!("Resubmitting retry-state peg-outs");
            }
        }
        retry_pending = process_pending(&custodian, &completed).await?;
    }
}

/// Attempt every not-yet and retry record once.
///
/// Returns whether any record is left in retry.
pub async fn process_pending(
    custodian: &Custodian,
    completed: &mpsc::Sender<TxId>,
) -> CustodianResult<bool> {
    let rows = custodian.store.pending_exports()?;
    let mut retry_pending = false;
    for row in rows {
        let state = peg_out_row(custodian, &row).await?;
        match state {
            PegOutState::Retry => retry_pending = true,
            s if s.is_terminal() => forward(completed, row.txid),
            _ => {}
        }
    }
    Ok(retry_pending)
}

/// Submit the peg-out for one record and persist the outcome.
pub async fn peg_out_row(custodian: &Custodian, row: &ExportRow) -> CustodianResult<PegOutState> {
    let record = decode_row(row)?;
    let prior = record.state;
    if !prior.is_pending() {
        return Ok(prior);
    }

    let tx = pegout_tx_for(&record.pegout, custodian.account, custodian.config.base_fee)
        .map_err(|e| {
            CustodianError::Invariant(format!("export {} has unusable payload: {e}", record.txid))
        })?;
    let signed = tx.sign(custodian.network(), &[&custodian.main_key]);
    let result = custodian.main.submit(&signed).await;
    let next = classify(&result);

    match &result {
        Ok(res) => info!(
            txid = %record.txid,
            exporter = %record.pegout.exporter,
            amount = %format_amount(record.pegout.amount),
            ledger = res.ledger,
            "Peg-out submitted"
        ),
        Err(e) if next == PegOutState::Retry => {
            warn!(txid = %record.txid, error = %e, "Peg-out not yet valid, will retry")
        }
        Err(e) => error!(txid = %record.txid, error = %e, "Peg-out failed"),
    }

    if next == prior {
        return Ok(prior);
    }
    prior.transition(next).map_err(|e| {
        CustodianError::Invariant(format!("export {}: {e}", record.txid))
    })?;
    let rows = custodian.store.set_pegout_state(&record.txid, prior, next)?;
    if rows != 1 {
        return Err(CustodianError::Invariant(format!(
            "peg-out state update {prior} -> {next} for {} affected {rows} rows",
            record.txid
        )));
    }
    Ok(next)
}

fn decode_row(row: &ExportRow) -> CustodianResult<ExportRecord> {
    row.decode().map_err(|e| {
        CustodianError::Invariant(format!("stored export {} is corrupt: {e}", row.txid))
    })
}

fn forward(completed: &mpsc::Sender<TxId>, txid: TxId) {
    match completed.try_send(txid) {
        Ok(()) => {}
        Err(TrySendError::Full(txid)) => {
            warn!(txid = %txid, "Finalizer queue full, leaving record to the sweep")
        }
        Err(TrySendError::Closed(txid)) => {
            debug!(txid = %txid, "Finalizer gone, leaving record to the sweep")
        }
    }
}

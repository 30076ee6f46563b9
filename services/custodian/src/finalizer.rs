//! Post-Peg-Out Finalizer — side-ledger settlement of terminal exports
//!
//! For an export whose peg-out reached ok, the value held in the export
//! contract is retired; for fail, it is repaid to the exporter. Either
//! way the custodian spends the stage 2 output with its own signature.
//!
//! Records arrive from the peg-out engine's queue; a periodic sweep picks
//! up anything the queue dropped or a previous run left unsettled. A
//! settlement whose contract value is already spent counts as landed.

use std::sync::Arc;

use ed25519_dalek::Signer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use persistence::ExportRow;
use programs::custodian::with_signature;
use programs::{Settlement, ValueSpec};
use types::ids::TxId;
use types::pegout::{ExportRecord, PegOutState};

use crate::context::Custodian;
use crate::error::{CustodianError, CustodianResult};
use crate::ledger::{SettlementError, SideTx, SIDE_TX_VERSION};

/// Outcome of one settlement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Landed,
    AlreadySpent,
    /// Left for the next sweep
    Deferred,
}

/// Run until cancelled. Errors returned are fatal.
pub async fn run_finalizer(
    custodian: Arc<Custodian>,
    mut completed: mpsc::Receiver<TxId>,
    cancel: CancellationToken,
) -> CustodianResult<()> {
    // first tick fires immediately and doubles as the startup sweep
    let mut sweep = tokio::time::interval(custodian.config.sweep_interval());
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut queue_open = true;
    info!("Finalizer started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Finalizer stopped");
                return Ok(());
            }
            _ = sweep.tick() => {
                sweep_unsettled(&custodian).await?;
            }
            msg = completed.recv(), if queue_open => match msg {
                Some(txid) => {
                    settle_txid(&custodian, &txid).await?;
                }
                None => {
                    debug!("Peg-out queue closed, relying on sweep");
                    queue_open = false;
                }
            },
        }
    }
}

/// Settle every terminal, unsettled record.
pub async fn sweep_unsettled(custodian: &Custodian) -> CustodianResult<usize> {
    let rows = custodian.store.unsettled_pegouts()?;
    if !rows.is_empty() {
        debug!(count = rows.len(), "Sweeping unsettled peg-outs");
    }
    let mut landed = 0;
    for row in rows {
        if settle_row(custodian, &row).await? != Settled::Deferred {
            landed += 1;
        }
    }
    Ok(landed)
}

async fn settle_txid(custodian: &Custodian, txid: &TxId) -> CustodianResult<()> {
    match custodian.store.export(txid)? {
        Some(row) if !row.settled => {
            settle_row(custodian, &row).await?;
        }
        Some(_) => debug!(txid = %txid, "Already settled"),
        None => {
            return Err(CustodianError::Invariant(format!(
                "finalizer received unknown export {txid}"
            )))
        }
    }
    Ok(())
}

fn selector(state: PegOutState) -> Option<Settlement> {
    match state {
        PegOutState::Ok => Some(Settlement::Retire),
        PegOutState::Fail => Some(Settlement::Repay),
        PegOutState::NotYet | PegOutState::Retry => None,
    }
}

/// Build, sign and submit the settlement for one record.
///
/// Side-ledger failures are logged and deferred; only store failures and
/// corrupt records are returned.
pub async fn settle_row(custodian: &Custodian, row: &ExportRow) -> CustodianResult<Settled> {
    let record: ExportRecord = row.decode().map_err(|e| {
        CustodianError::Invariant(format!("stored export {} is corrupt: {e}", row.txid))
    })?;
    let Some(selector) = selector(record.state) else {
        return Err(CustodianError::Invariant(format!(
            "export {} is {} and cannot be settled",
            record.txid, record.state
        )));
    };

    let tx = match settlement_tx(custodian, row, &record, selector).await {
        Ok(tx) => tx,
        Err(e) if e.is_transient() => {
            warn!(txid = %record.txid, error = %e, "Settlement dry run failed, deferring");
            return Ok(Settled::Deferred);
        }
        Err(e) => return Err(e),
    };

    let outcome = match custodian.side.submit(&tx).await {
        Ok(settlement_id) => {
            info!(
                txid = %record.txid,
                settlement = %settlement_id,
                state = %record.state,
                "Export settled"
            );
            Settled::Landed
        }
        Err(SettlementError::AlreadySpent) => {
            info!(txid = %record.txid, "Export value already spent, treating as settled");
            Settled::AlreadySpent
        }
        Err(e) => {
            warn!(txid = %record.txid, error = %e, "Settlement rejected, deferring");
            return Ok(Settled::Deferred);
        }
    };

    if custodian.store.mark_settled(&record.txid)? == 0 {
        debug!(txid = %record.txid, "Settlement flag already set");
    }
    Ok(outcome)
}

async fn settlement_tx(
    custodian: &Custodian,
    row: &ExportRow,
    record: &ExportRecord,
    selector: Settlement,
) -> CustodianResult<SideTx> {
    let p = &record.pegout;
    let value = ValueSpec {
        amount: p.amount,
        asset_id: custodian.contracts.imported_asset_id(&p.asset),
        anchor: p.anchor32()?,
    };
    // the payload must match the logged bytes, not a re-serialization
    let prefix = custodian.contracts.settlement_prefix(
        &p.exporter_pubkey()?,
        &row.pegout_json,
        &value,
        selector,
    )?;
    let dry = custodian.side.dry_run(&prefix).await?;
    let sig = custodian.side_key.sign(dry.txid.as_bytes());
    let program = with_signature(&prefix, &sig.to_bytes(), None)?;
    Ok(SideTx {
        version: SIDE_TX_VERSION,
        runlimit: dry.runlimit,
        program,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_by_state() {
        assert_eq!(selector(PegOutState::Ok), Some(Settlement::Retire));
        assert_eq!(selector(PegOutState::Fail), Some(Settlement::Repay));
        assert_eq!(selector(PegOutState::Retry), None);
        assert_eq!(selector(PegOutState::NotYet), None);
    }
}

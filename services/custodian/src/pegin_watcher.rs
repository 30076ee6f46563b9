//! Peg-In Watcher — main-ledger payments into the custodian account
//!
//! Streams the custodian account's transactions from the persisted cursor.
//! A payment to the custodian inside a transaction whose memo is a 32-byte
//! hash marks the matching pending peg as observed, at most once. The
//! cursor is saved after every transaction, so a restart resumes without
//! gaps and replays are harmless.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use types::amount::format_amount;
use types::ids::NonceHash;
use types::transaction::SignedTransaction;
use types::xdr::{XdrDecode, XdrEncode};

use crate::backoff::Backoff;
use crate::context::Custodian;
use crate::error::{CustodianError, CustodianResult};
use crate::ledger::{LedgerError, StreamedTx};

/// Run until cancelled. Errors returned are fatal.
pub async fn watch_pegins(custodian: Arc<Custodian>, cancel: CancellationToken) -> CustodianResult<()> {
    let mut backoff = Backoff::from_config(&custodian.config);
    info!(account = %custodian.account, "Peg-in watcher started");

    loop {
        let cursor = custodian.store.cursor(custodian.seed())?;
        debug!(cursor = %cursor, "Streaming custodian transactions");
        let mut stream = custodian.main.stream_transactions(&custodian.account, cursor);

        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Peg-in watcher stopped");
                    return Ok(());
                }
                item = stream.next() => item,
            };
            match item {
                None => break,
                Some(Err(LedgerError::Cancelled)) => {
                    info!("Peg-in watcher stopped");
                    return Ok(());
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Custodian transaction stream failed");
                    break;
                }
                Some(Ok(tx)) => {
                    handle_pegin_tx(&custodian, &tx)?;
                    backoff.reset();
                }
            }
        }

        if !backoff.wait(&cancel).await {
            info!("Peg-in watcher stopped");
            return Ok(());
        }
    }
}

/// Process one streamed transaction and advance the cursor past it.
///
/// Returns the nonce hashes newly marked observed.
pub fn handle_pegin_tx(custodian: &Custodian, tx: &StreamedTx) -> CustodianResult<Vec<NonceHash>> {
    let envelope = SignedTransaction::from_xdr(&tx.envelope_xdr).map_err(|e| {
        CustodianError::Invariant(format!(
            "undecodable envelope at cursor {}: {e}",
            tx.paging_token
        ))
    })?;

    let mut observed = Vec::new();
    if let Some(nonce_hash) = envelope.tx.memo.nonce_hash() {
        for op in &envelope.tx.operations {
            let Some((asset, amount)) = op.payment_to(&custodian.account) else {
                continue;
            };
            let asset_xdr = asset.to_xdr();
            let rows = custodian
                .store
                .mark_peg_observed(&nonce_hash, amount, &asset_xdr)?;
            match rows {
                0 => {
                    debug!(nonce_hash = %nonce_hash, "No pending peg for payment");
                }
                1 => {
                    info!(
                        nonce_hash = %nonce_hash,
                        asset = %asset,
                        amount = %format_amount(amount),
                        "Peg-in observed"
                    );
                    observed.push(nonce_hash);
                }
                n => {
                    return Err(CustodianError::Invariant(format!(
                        "peg-in for {nonce_hash} updated {n} rows"
                    )))
                }
            }
        }
    }

    custodian
        .store
        .set_cursor(custodian.seed(), &tx.paging_token)?;
    if !observed.is_empty() {
        custodian.signals.imports.notify();
    }
    Ok(observed)
}

//! Export Watcher — side-ledger exports into this custodian's contract
//!
//! Consumes side-ledger blocks through the `watchExports` pin. A
//! transaction whose log has the export shape and logs this custodian's
//! stage 1 seed carries a JSON peg-out payload. A payload that decodes and
//! validates is recorded once per transaction id and the peg-out engine is
//! woken; anything else is logged and skipped.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use programs::log::recognize_export;
use types::amount::format_amount;
use types::pegout::PegOut;

use crate::context::Custodian;
use crate::error::CustodianResult;
use crate::ledger::Block;
use crate::pin::{run_pin, BlockHandler};

pub struct ExportWatcher {
    custodian: Arc<Custodian>,
}

impl ExportWatcher {
    pub fn new(custodian: Arc<Custodian>) -> Self {
        Self { custodian }
    }
}

#[async_trait]
impl BlockHandler for ExportWatcher {
    async fn handle(&mut self, block: &Block) -> CustodianResult<()> {
        let c = &self.custodian;
        let mut recorded = 0usize;
        for tx in &block.transactions {
            let Some(payload) = recognize_export(&tx.log, &c.contracts.export_stage1_seed) else {
                continue;
            };
            let pegout = match PegOut::from_json(payload) {
                Ok(p) => p,
                Err(e) => {
                    warn!(txid = %tx.id, error = %e, "Skipping export with malformed payload");
                    continue;
                }
            };
            if let Err(e) = pegout.validate() {
                warn!(txid = %tx.id, error = %e, "Skipping export with unusable payload");
                continue;
            }
            let asset_id = c.contracts.imported_asset_id(&pegout.asset);

            if c.store.insert_export(&tx.id, payload)? {
                info!(
                    txid = %tx.id,
                    height = block.height,
                    asset_id = %hex::encode(asset_id),
                    amount = %format_amount(pegout.amount),
                    exporter = %pegout.exporter,
                    "Export recorded"
                );
                recorded += 1;
            } else {
                debug!(txid = %tx.id, "Export already recorded");
            }
        }
        if recorded > 0 {
            c.signals.exports.notify();
        }
        Ok(())
    }
}

/// Run until cancelled. Errors returned are fatal.
pub async fn watch_exports(custodian: Arc<Custodian>, cancel: CancellationToken) -> CustodianResult<()> {
    let name = custodian.config.export_pin_name.clone();
    let mut watcher = ExportWatcher::new(custodian.clone());
    run_pin(&custodian, &name, &mut watcher, &cancel).await
}

//! Pinned side-ledger block consumption
//!
//! A pin is a named consumer of side-ledger blocks whose progress is
//! persisted. Each block is handed to the handler exactly once across
//! restarts: the height is stored only after the handler succeeds, and a
//! failed block is retried before anything later is delivered.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::context::Custodian;
use crate::error::CustodianResult;
use crate::ledger::Block;

/// Height of the first side-ledger block
pub const FIRST_BLOCK_HEIGHT: u64 = 1;

#[async_trait]
pub trait BlockHandler: Send {
    async fn handle(&mut self, block: &Block) -> CustodianResult<()>;
}

/// Deliver blocks to `handler` until cancelled.
///
/// Transient handler errors retry the same block with backoff; any other
/// handler error is returned.
pub async fn run_pin<H: BlockHandler>(
    custodian: &Custodian,
    name: &str,
    handler: &mut H,
    cancel: &CancellationToken,
) -> CustodianResult<()> {
    let mut backoff = Backoff::from_config(&custodian.config);
    let mut next = custodian
        .store
        .pin_height(name)?
        .map_or(FIRST_BLOCK_HEIGHT, |h| h.saturating_add(1));
    info!(pin = name, from_height = next, "Pin started");

    loop {
        let mut blocks = custodian.side.blocks_from(next);
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(pin = name, "Pin stopped");
                    return Ok(());
                }
                item = blocks.next() => item,
            };
            let block = match item {
                None => {
                    debug!(pin = name, next, "Block stream ended");
                    break;
                }
                Some(Err(e)) => {
                    warn!(pin = name, error = %e, "Block stream failed");
                    break;
                }
                Some(Ok(block)) => block,
            };
            if block.height < next {
                continue;
            }
            if block.height > next {
                warn!(pin = name, expected = next, got = block.height, "Block gap, reconnecting");
                break;
            }

            loop {
                match handler.handle(&block).await {
                    Ok(()) => break,
                    Err(e) if e.is_transient() => {
                        warn!(pin = name, height = block.height, error = %e, "Block handler failed, retrying");
                        if !backoff.wait(cancel).await {
                            return Ok(());
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
            custodian.store.set_pin_height(name, block.height)?;
            next = block.height + 1;
            backoff.reset();
        }

        if !backoff.wait(cancel).await {
            info!(pin = name, "Pin stopped");
            return Ok(());
        }
    }
}

use super::{Fabric, GatewayConnection, ShardId};
use crate::event::{CONNECTED, DISCONNECTED};
use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dispatch frame handed over by the gateway transport
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchFrame {
    /// Event name (e.g. "PRESENCE_UPDATE")
    #[serde(rename = "t")]
    pub event: Option<String>,

    /// Gateway sequence number
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,

    /// Event payload
    #[serde(rename = "d", default)]
    pub data: Value,
}

/// Connection state of one shard as seen by the fabric
#[derive(Debug)]
pub struct ShardHandle {
    shard_id: ShardId,
    connected: AtomicBool,
    last_sequence: AtomicU64,
}

impl ShardHandle {
    pub fn new(shard_id: ShardId) -> Arc<Self> {
        Arc::new(Self {
            shard_id,
            connected: AtomicBool::new(false),
            last_sequence: AtomicU64::new(0),
        })
    }

    /// Last dispatch sequence processed on this shard
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl GatewayConnection for ShardHandle {
    fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Process one shard's frame stream in arrival order.
///
/// Registers `shard` with the fabric, reports `CONNECTED` to the event
/// handler, feeds every frame through it, and reports `DISCONNECTED` when the
/// stream ends. Bad frames and failed events are logged and skipped; they
/// never end the loop. Returns the number of frames dispatched.
pub async fn run_shard<S>(fabric: Arc<Fabric>, shard: Arc<ShardHandle>, frames: S) -> Result<u64>
where
    S: Stream<Item = DispatchFrame> + Unpin,
{
    let shard_id = shard.shard_id;
    let handler = Arc::clone(
        fabric
            .event_handler()
            .context("Shard started before the event handler was wired")?,
    );

    fabric.register_gateway(shard.clone());
    shard.set_connected(true);
    handler.consume_raw_event(shard_id, CONNECTED, &json!({}));
    info!(shard_id = ?shard_id, "Shard processing started");

    let mut frames = frames;
    let mut dispatched = 0_u64;

    while let Some(frame) = frames.next().await {
        let Some(event) = frame.event.as_deref() else {
            warn!(shard_id = ?shard_id, sequence = ?frame.sequence, "Frame without event name, skipping");
            continue;
        };

        debug!(shard_id = ?shard_id, event = %event, sequence = ?frame.sequence, "Dispatching frame");
        handler.consume_raw_event(shard_id, event, &frame.data);

        if let Some(sequence) = frame.sequence {
            shard.last_sequence.store(sequence, Ordering::SeqCst);
        }
        dispatched += 1;
    }

    shard.set_connected(false);
    handler.consume_raw_event(
        shard_id,
        DISCONNECTED,
        &json!({ "code": null, "reason": "frame stream ended" }),
    );
    warn!(shard_id = ?shard_id, dispatched = dispatched, "Shard frame stream ended");

    Ok(dispatched)
}

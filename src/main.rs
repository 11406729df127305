use anyhow::{Context, Result};
use serde::Deserialize;
use shardweave::config::{load_config, Config};
use shardweave::event::Notification;
use shardweave::fabric::{run_shard, DispatchFrame, ShardHandle, ShardId};
use shardweave::Fabric;
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

/// One line of replay input: a dispatch frame plus the shard it arrived on
#[derive(Deserialize)]
struct ReplayLine {
    #[serde(default)]
    shard: ShardId,
    #[serde(flatten)]
    frame: DispatchFrame,
}

/// Replays newline-delimited dispatch frames from stdin through a fabric and
/// logs every resulting notification.
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path)?,
        None => Config::default(),
    };

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .init();

    info!("Shardweave replay starting...");

    let fabric = Fabric::with_defaults(&config);
    let mut notifications = fabric.event_handler()?.subscribe();

    let logger = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => log_notification(&notification),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Notification logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut senders = HashMap::new();
    let mut shards = Vec::new();
    for shard_id in config.shards.shard_keys() {
        let (tx, rx) = mpsc::channel(256);
        senders.insert(shard_id, tx);
        shards.push(tokio::spawn(run_shard(
            fabric.clone(),
            ShardHandle::new(shard_id),
            ReceiverStream::new(rx),
        )));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let entry: ReplayLine = match serde_json::from_str(&line) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping malformed replay line");
                continue;
            }
        };

        let Some(tx) = senders.get(&entry.shard).or_else(|| senders.get(&None)) else {
            warn!(shard_id = ?entry.shard, "Frame for a shard that is not running, skipping");
            continue;
        };
        if tx.send(entry.frame).await.is_err() {
            warn!(shard_id = ?entry.shard, "Shard task is gone, dropping frame");
        }
    }

    // Closing the channels ends every shard's frame stream
    drop(senders);
    for shard in shards {
        let dispatched = shard.await.context("Shard task panicked")??;
        info!(dispatched = dispatched, "Shard finished");
    }

    // Dropping the fabric drops the handler and closes the notification channel
    drop(fabric);
    logger.await.context("Notification logger panicked")?;

    info!("Shardweave replay finished");
    Ok(())
}

fn log_notification(notification: &Notification) {
    match notification {
        Notification::ShardConnected { shard_id } => {
            info!(shard_id = ?shard_id, "shard connected");
        }
        Notification::ShardDisconnected {
            shard_id,
            code,
            reason,
        } => {
            info!(shard_id = ?shard_id, code = ?code, reason = ?reason, "shard disconnected");
        }
        Notification::Ready { shard_id, user } => {
            info!(shard_id = ?shard_id, user = %user.tag(), "ready");
        }
        Notification::UserUpdated { before, after } => {
            info!(user_id = %after.id, created = before.is_none(), tag = %after.tag(), "user updated");
        }
        Notification::PresenceUpdated {
            user_id,
            before,
            after,
        } => {
            info!(
                user_id = %user_id,
                before = ?before.as_ref().map(|p| p.status),
                status = %after.status,
                activities = after.activities.len(),
                "presence updated"
            );
        }
        Notification::PresenceRemoved { user_id, .. } => {
            info!(user_id = %user_id, "presence removed");
        }
    }
}

//! Finnhub trade websocket feeding `AlertEngine::on_market_tick`.
//!
//! Subscriptions follow the engine's watched symbols and are re-synced
//! periodically, so alerts created after connect start receiving data.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::Message as TMessage, Error as WsError},
};

use crate::services::engine::AlertEngine;

const RESYNC_EVERY: Duration = Duration::from_secs(30);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trade {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: f64,
    #[serde(rename = "v", default)]
    pub volume: f64,
    // epoch millis
    #[serde(rename = "t")]
    pub ts: i64,
}

#[derive(Debug, Deserialize)]
struct FeedMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Vec<Trade>,
}

/// Trades contained in one text frame. Pings, errors and junk yield nothing.
pub fn parse_trades(txt: &str) -> Vec<Trade> {
    match serde_json::from_str::<FeedMessage>(txt) {
        Ok(msg) if msg.kind == "trade" => msg.data,
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::debug!("ignoring unparseable feed frame: {}", e);
            Vec::new()
        }
    }
}

/// Spawns the feed task. Returns None when no API key is configured.
pub fn spawn_trade_feed(engine: Arc<AlertEngine>, token: String) -> Option<JoinHandle<()>> {
    let token = token.trim().to_string();
    if token.is_empty() {
        tracing::info!("FINNHUB_API_KEY not set, market feed disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut backoff = Duration::from_secs(1);
        loop {
            match run_session(&engine, &token).await {
                Ok(()) => {
                    tracing::warn!("Finnhub WS closed, reconnecting");
                    backoff = Duration::from_secs(1);
                }
                Err(err) => {
                    tracing::warn!("Finnhub WS error: {}, retrying in {:?}", err, backoff);
                }
            }
            sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }))
}

async fn sync_subscriptions<S>(
    engine: &AlertEngine,
    subscribed: &mut BTreeSet<String>,
    write: &mut S,
) -> Result<(), WsError>
where
    S: Sink<TMessage, Error = WsError> + Unpin,
{
    let wanted = engine.watched_symbols().await;

    for sym in wanted.difference(subscribed) {
        let msg = serde_json::json!({ "type": "subscribe", "symbol": sym });
        write.send(TMessage::Text(msg.to_string())).await?;
        tracing::debug!("subscribed {}", sym);
    }
    for sym in subscribed.difference(&wanted) {
        let msg = serde_json::json!({ "type": "unsubscribe", "symbol": sym });
        write.send(TMessage::Text(msg.to_string())).await?;
        tracing::debug!("unsubscribed {}", sym);
    }

    *subscribed = wanted;
    Ok(())
}

async fn run_session(engine: &AlertEngine, token: &str) -> Result<(), WsError> {
    let url = format!("wss://ws.finnhub.io/?token={}", token);

    tracing::info!("Connecting to Finnhub WS...");
    let (ws, _) = connect_async(url.as_str()).await?;
    tracing::info!("Finnhub WS connected OK");

    let (mut write, mut read) = ws.split();
    let mut subscribed: BTreeSet<String> = BTreeSet::new();
    let mut resync = interval(RESYNC_EVERY);

    loop {
        tokio::select! {
            _ = resync.tick() => {
                sync_subscriptions(engine, &mut subscribed, &mut write).await?;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(TMessage::Text(txt))) => {
                        for t in parse_trades(&txt) {
                            engine.on_market_tick(&t.symbol, t.price, t.volume, t.ts);
                        }
                    }
                    Some(Ok(TMessage::Ping(payload))) => {
                        write.send(TMessage::Pong(payload)).await?;
                    }
                    Some(Ok(TMessage::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                }
            }
        }
    }
}

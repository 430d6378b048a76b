//! Public WebSocket stream delivering closed klines.

use crate::models::candle::Candle;
use crate::models::timeframe::BaseInterval;
use crate::services::bybit::messages::{kline_topic, WsAck, WsKlineMessage};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

const PING_INTERVAL: Duration = Duration::from_secs(20);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Owns a background task that keeps one kline subscription alive across
/// reconnects and forwards only confirmed (closed) bars.
pub struct BybitWsClient {
    url: String,
    handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl BybitWsClient {
    pub fn new(url: String) -> Self {
        Self {
            url,
            handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Spawn the stream task for one symbol and interval. Dropping the
    /// returned receiver makes the task wind down on its own.
    pub async fn stream_closed_klines(
        &self,
        symbol: &str,
        interval: BaseInterval,
    ) -> mpsc::Receiver<Candle> {
        let (tx, rx) = mpsc::channel(128);
        let topic = kline_topic(interval, symbol);
        let task = tokio::spawn(run_stream(self.url.clone(), topic, tx));
        let mut guard = self.handle.write().await;
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = Some(task);
        rx
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.handle.write().await.take() {
            handle.abort();
            debug!("BybitWsClient: stream task stopped");
        }
    }
}

async fn run_stream(url: String, topic: String, tx: mpsc::Sender<Candle>) {
    if let Err(e) = url::Url::parse(&url) {
        error!(error = %e, %url, "BybitWsClient: invalid stream url");
        return;
    }
    let mut backoff = Duration::from_secs(1);
    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                info!(%topic, "BybitWsClient: connected");
                backoff = Duration::from_secs(1);
                if let Err(e) = drive(ws, &topic, &tx).await {
                    warn!(error = %e, "BybitWsClient: connection error");
                }
            }
            Err(e) => {
                warn!(error = %e, "BybitWsClient: connect failed");
            }
        }
        if tx.is_closed() {
            break;
        }
        warn!(retry_in = ?backoff, %topic, "BybitWsClient: reconnecting");
        sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_RECONNECT_DELAY);
    }
    debug!(%topic, "BybitWsClient: stream task finished");
}

async fn drive(ws: WsStream, topic: &str, tx: &mpsc::Sender<Candle>) -> Result<(), WsError> {
    let (mut sink, mut stream) = ws.split();
    let subscribe = json!({ "op": "subscribe", "args": [topic] }).to_string();
    sink.send(Message::Text(subscribe)).await?;
    let ping = json!({ "op": "ping" }).to_string();
    let mut ping_timer = tokio::time::interval(PING_INTERVAL);
    ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ping_timer.tick() => {
                sink.send(Message::Text(ping.clone())).await?;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !handle_text(&text, tx).await {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    sink.send(Message::Pong(payload)).await?;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }
}

/// Returns false when the consumer is gone and the stream should stop.
async fn handle_text(text: &str, tx: &mpsc::Sender<Candle>) -> bool {
    if let Ok(message) = serde_json::from_str::<WsKlineMessage>(text) {
        for kline in message.data.iter().filter(|k| k.confirm) {
            match kline.to_candle() {
                Ok(candle) => {
                    if tx.send(candle).await.is_err() {
                        return false;
                    }
                }
                Err(e) => {
                    warn!(error = %e, topic = %message.topic, "BybitWsClient: bad kline payload");
                }
            }
        }
        return true;
    }
    if let Ok(ack) = serde_json::from_str::<WsAck>(text) {
        if ack.success == Some(false) {
            warn!(message = ?ack.ret_msg, "BybitWsClient: request rejected");
        } else {
            debug!(op = ?ack.op, "BybitWsClient: control frame");
        }
    }
    true
}

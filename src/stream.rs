use std::fmt;

use futures::{SinkExt, StreamExt};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Result;

pub const STREAM_BASE_URL: &str = "wss://api.fyers.in/socket/v3/data";

/// Streaming data mode requested in the subscribe message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Full OHLCV quote per update.
    SymbolUpdate,
    /// Last-traded-price only.
    LtpOnly,
}

impl TickMode {
    pub fn as_wire(self) -> &'static str {
        match self {
            TickMode::SymbolUpdate => "symbolUpdate",
            TickMode::LtpOnly => "l2Update",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "symbolUpdate" => Some(TickMode::SymbolUpdate),
            "l2Update" => Some(TickMode::LtpOnly),
            _ => None,
        }
    }
}

/// One realtime update. The upstream sends two shapes, discriminated by the
/// presence of the `l` (low) field.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Quote {
        symbol: String,
        ltp: f64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    },
    Ltp {
        symbol: String,
        ltp: f64,
    },
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tick::Quote {
                symbol,
                ltp,
                open,
                high,
                low,
                close,
                volume,
            } => write!(
                f,
                "{symbol}  LTP {ltp:>8.2}  O {open:>8.2}  H {high:>8.2}  L {low:>8.2}  C {close:>8.2}  Vol {volume:>10}"
            ),
            Tick::Ltp { symbol, ltp } => write!(f, "{symbol}  LTP {ltp:>8.2}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct Subscribe<'a> {
    #[serde(rename = "T")]
    message_type: &'a str,
    #[serde(rename = "S")]
    symbols: &'a [String],
    #[serde(rename = "MK")]
    mode: &'a str,
}

/// Streaming connection URL carrying `client_id:access_token`.
pub fn stream_url(base: &str, client_id: &str, access_token: &str) -> String {
    format!("{base}?access_token={client_id}:{access_token}")
}

pub fn subscribe_message(symbols: &[String], mode: TickMode) -> Result<String> {
    Ok(serde_json::to_string(&Subscribe {
        message_type: "SUB_L2",
        symbols,
        mode: mode.as_wire(),
    })?)
}

/// Parse one inbound frame into a tick; frames that are not tick records
/// (acks, heartbeats) yield `None`.
pub fn parse_tick(raw: &str) -> Option<Tick> {
    let data: Value = serde_json::from_str(raw).ok()?;
    let symbol = field_string(data.get("tk")?)?;
    let ltp = field_number(data.get("ltp")?)?;
    if data.get("l").is_some() {
        Some(Tick::Quote {
            symbol,
            ltp,
            open: field_number(data.get("o")?)?,
            high: field_number(data.get("h")?)?,
            low: field_number(data.get("l")?)?,
            close: field_number(data.get("c")?)?,
            volume: data.get("v")?.as_i64()?,
        })
    } else {
        Some(Tick::Ltp { symbol, ltp })
    }
}

fn field_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Persistent tick subscription. Connects once, subscribes once, and hands
/// every parsed tick to the callback until the peer closes or errors out.
/// No reconnect and no buffering: best-effort monitoring.
pub struct TickStream {
    url: String,
    symbols: Vec<String>,
    mode: TickMode,
}

impl TickStream {
    pub fn new(url: impl Into<String>, symbols: Vec<String>, mode: TickMode) -> Self {
        Self {
            url: url.into(),
            symbols,
            mode,
        }
    }

    pub async fn run<F: FnMut(Tick)>(&self, mut on_tick: F) -> Result<()> {
        let (mut socket, _) = connect_async(self.url.as_str()).await?;
        info!(
            "websocket connected, subscribing to {} symbol(s)",
            self.symbols.len()
        );
        socket
            .send(Message::Text(subscribe_message(&self.symbols, self.mode)?))
            .await?;

        while let Some(frame) = socket.next().await {
            match frame? {
                Message::Text(text) => match parse_tick(&text) {
                    Some(tick) => on_tick(tick),
                    None => debug!("skipping unrecognised frame: {text}"),
                },
                Message::Close(_) => {
                    info!("websocket closed by server");
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

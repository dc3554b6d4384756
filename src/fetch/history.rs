use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use log::info;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::fetch::chunks::{date_chunks, DateChunk};

pub const DATA_BASE_URL: &str = "https://api.fyers.in/data";

/// One OHLCV sample, timestamped with the exchange wall clock (IST),
/// floored to the minute.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub date_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    s: String,
    #[serde(default)]
    candles: Vec<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Authenticated client for the chunked historical-candle download.
pub struct HistoryClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    access_token: String,
}

impl HistoryClient {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_base_url(DATA_BASE_URL, client_id, access_token)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            client_id: client_id.into(),
            access_token: access_token.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/{path}")
    }

    /// Fetch `[start, end]` in resolution-capped chunks and return one
    /// chronological series.
    ///
    /// All-or-nothing: a chunk that comes back empty aborts the whole fetch
    /// with `AppError::DataUnavailable`, discarding earlier chunks.
    pub async fn fetch(
        &self,
        symbol: &str,
        resolution: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Candle>> {
        let mut candles = Vec::new();
        for chunk in date_chunks(start, end, resolution) {
            let batch = self.fetch_chunk(symbol, resolution, chunk).await?;
            if batch.is_empty() {
                return Err(AppError::DataUnavailable {
                    symbol: symbol.to_string(),
                    from: chunk.from,
                    to: chunk.to,
                });
            }
            info!("fetched {} candles: {} to {}", batch.len(), chunk.from, chunk.to);
            candles.extend(batch);
        }
        Ok(candles)
    }

    async fn fetch_chunk(
        &self,
        symbol: &str,
        resolution: &str,
        chunk: DateChunk,
    ) -> Result<Vec<Candle>> {
        let range_from = chunk.from.format("%Y-%m-%d").to_string();
        let range_to = chunk.to.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(self.endpoint("history"))
            .header(
                AUTHORIZATION,
                format!("{}:{}", self.client_id, self.access_token),
            )
            .query(&[
                ("symbol", symbol),
                ("resolution", resolution),
                ("date_format", "1"),
                ("range_from", range_from.as_str()),
                ("range_to", range_to.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let parsed: HistoryResponse = serde_json::from_str(&body).map_err(|err| {
            AppError::message(format!(
                "malformed history response for {symbol} ({range_from} to {range_to}): {err}"
            ))
        })?;

        match parsed.s.as_str() {
            "ok" => Ok(parsed.candles.iter().filter_map(parse_candle).collect()),
            "no_data" => Ok(Vec::new()),
            other => Err(AppError::message(format!(
                "history request failed for {symbol} ({range_from} to {range_to}): {}",
                parsed.message.unwrap_or_else(|| format!("status `{other}`"))
            ))),
        }
    }
}

/// Parse one `[ts, o, h, l, c, v]` row; rows that do not fit are skipped.
fn parse_candle(row: &Value) -> Option<Candle> {
    let row = row.as_array()?;
    if row.len() < 6 {
        return None;
    }
    let ts = row[0].as_i64().or_else(|| row[0].as_f64().map(|v| v as i64))?;
    Some(Candle {
        date_time: normalize_timestamp(ts)?,
        open: number(&row[1])?,
        high: number(&row[2])?,
        low: number(&row[3])?,
        close: number(&row[4])?,
        volume: number(&row[5])? as i64,
    })
}

fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Indian Standard Time, the exchange wall clock.
fn ist() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("IST offset is in range")
}

/// Epoch seconds to IST wall-clock time with the zone annotation stripped,
/// floored to the minute.
fn normalize_timestamp(epoch_seconds: i64) -> Option<NaiveDateTime> {
    let utc = DateTime::from_timestamp(epoch_seconds, 0)?;
    let local = utc.with_timezone(&ist()).naive_local();
    local.with_second(0)?.with_nanosecond(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Days;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn normalizes_epoch_to_ist_minute() {
        // 1970-01-01T00:00:59Z is 05:30:59 IST; seconds are floored away.
        let dt = normalize_timestamp(59).unwrap();
        assert_eq!(dt.to_string(), "1970-01-01 05:30:00");

        let dt = normalize_timestamp(86_400).unwrap();
        assert_eq!(dt.to_string(), "1970-01-02 05:30:00");
    }

    #[test]
    fn parses_candle_row() {
        let row = json!([86_400, 100.5, 110.0, 99.25, 105.0, 12345.0]);
        let candle = parse_candle(&row).unwrap();

        assert_eq!(candle.date_time.to_string(), "1970-01-02 05:30:00");
        assert_eq!(candle.open, 100.5);
        assert_eq!(candle.volume, 12345);
    }

    #[test]
    fn skips_malformed_rows() {
        assert!(parse_candle(&json!([86_400, 100.0, 110.0])).is_none());
        assert!(parse_candle(&json!("not a row")).is_none());
        assert!(parse_candle(&json!([86_400, "n/a", 1.0, 1.0, 1.0, 1.0])).is_none());
    }

    /// Serves canned history responses; a chunk whose `range_from` is listed
    /// in `empty_from` answers with no candles.
    async fn serve_history(listener: TcpListener, requests: usize, empty_from: Vec<String>) {
        for _ in 0..requests {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.expect("read");
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let request = String::from_utf8_lossy(&buf);
            let range_from = request
                .split("range_from=")
                .nth(1)
                .and_then(|rest| rest.split('&').next())
                .unwrap_or_default()
                .to_string();

            let body = if empty_from.contains(&range_from) {
                r#"{"s":"no_data","candles":[]}"#.to_string()
            } else {
                format!(r#"{{"s":"ok","candles":[[86400,1.0,2.0,0.5,1.5,100.0]],"message":"","echo":"{range_from}"}}"#)
            };
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.expect("write");
        }
    }

    #[tokio::test]
    async fn empty_chunk_aborts_the_whole_fetch() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = start + Days::new(250);
        let chunks = date_chunks(start, end, "1");
        assert_eq!(chunks.len(), 3);
        let second_from = chunks[1].from;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Chunk 2 of 3 is empty; the client must stop there.
        let server = tokio::spawn(serve_history(
            listener,
            2,
            vec![second_from.format("%Y-%m-%d").to_string()],
        ));

        let client = HistoryClient::with_base_url(format!("http://{addr}"), "CID", "TOKEN");
        let err = client.fetch("NSE:SBIN-EQ", "1", start, end).await.unwrap_err();

        match err {
            AppError::DataUnavailable { symbol, from, to } => {
                assert_eq!(symbol, "NSE:SBIN-EQ");
                assert_eq!(from, second_from);
                assert_eq!(to, chunks[1].to);
            }
            other => panic!("unexpected error: {other}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn concatenates_chunks_in_order() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = start + Days::new(150);
        let chunks = date_chunks(start, end, "1");
        assert_eq!(chunks.len(), 2);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_history(listener, 2, Vec::new()));

        let client = HistoryClient::with_base_url(format!("http://{addr}"), "CID", "TOKEN");
        let candles = client.fetch("NSE:SBIN-EQ", "1", start, end).await.unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].volume, 100);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn upstream_error_status_is_propagated() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut chunk = [0u8; 2048];
            let _ = socket.read(&mut chunk).await;
            let body = r#"{"s":"error","message":"invalid symbol"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.expect("write");
        });

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = start + Days::new(10);
        let client = HistoryClient::with_base_url(format!("http://{addr}"), "CID", "TOKEN");
        let err = client.fetch("NSE:BOGUS", "D", start, end).await.unwrap_err();

        match err {
            AppError::Message(msg) => assert!(msg.contains("invalid symbol")),
            other => panic!("unexpected error: {other}"),
        }
        server.await.unwrap();
    }
}

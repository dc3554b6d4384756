use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout_at, Instant};

use crate::error::{AppError, Result};

const CONFIRMATION_BODY: &str = "<html>\
<body><h1>Authorization Successful</h1><p>You can close this window.</p></body>\
</html>";

const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// Single-use HTTP listener that captures the `auth_code` query parameter
/// from the brokerage's browser redirect.
pub struct CallbackListener {
    listener: TcpListener,
}

impl CallbackListener {
    /// Bind to the given port on all interfaces. Port 0 picks an ephemeral one.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until one GET carries `auth_code`, then stop.
    ///
    /// The first code wins and consumes the listener; requests without a code
    /// get an empty 404 and leave the state untouched. Returns
    /// `AppError::AuthCodeTimeout` if no code arrives within `timeout`.
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let (stream, peer) = match timeout_at(deadline, self.listener.accept()).await {
                Ok(accepted) => accepted?,
                Err(_) => return Err(AppError::AuthCodeTimeout(timeout)),
            };
            debug!("callback connection from {peer}");
            match handle_request(stream).await {
                Ok(Some(code)) => {
                    info!("authorization code received");
                    return Ok(code);
                }
                Ok(None) => {}
                Err(err) => debug!("ignoring broken callback connection: {err}"),
            }
        }
    }
}

/// Read one HTTP request and reply; returns the auth code if the request had one.
async fn handle_request(mut stream: TcpStream) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() > MAX_REQUEST_BYTES {
            break;
        }
    }

    let request = String::from_utf8_lossy(&buf);
    let code = request
        .lines()
        .next()
        .and_then(parse_request_line)
        .and_then(|query| auth_code_from_query(&query));

    let response = match &code {
        Some(_) => format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            CONFIRMATION_BODY.len(),
            CONFIRMATION_BODY
        ),
        None => {
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
        }
    };
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;

    Ok(code)
}

/// Extract the query string from a `GET /path?query HTTP/1.1` request line.
fn parse_request_line(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    target.split_once('?').map(|(_, query)| query.to_string())
}

fn auth_code_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "auth_code")
        .map(|(_, value)| percent_decode(value))
        .filter(|code| !code.is_empty())
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

//! One-shot TCP pull of the MeteoBridge XML feed.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};

/// Request sent on every connection.
pub const REQUEST_HEADER: &[u8] = b"Content-type: text/xml; charset=UTF-8\n\n";

const READ_CHUNK: usize = 2048;

/// Once the device has started answering, this much silence ends the response.
const IDLE_AFTER_DATA: Duration = Duration::from_millis(500);

/// Connect, send the request header and read the response.
///
/// Reads until the device closes the connection, goes quiet after sending
/// data, or `max_response_bytes` is reached (the tail is dropped with a
/// warning). The socket is closed on every return path.
pub async fn fetch(device: &DeviceConfig) -> Result<Vec<u8>> {
    let limit = device.timeout();
    let deadline = Instant::now() + limit;

    let mut stream = match timeout(limit, TcpStream::connect((device.host.as_str(), device.port)))
        .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(Error::Connection(e)),
        Err(_) => return Err(Error::Timeout(limit)),
    };
    log::debug!("Connected to MeteoBridge at {}:{}", device.host, device.port);

    match timeout_at(deadline, stream.write_all(REQUEST_HEADER)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(Error::Connection(e)),
        Err(_) => return Err(Error::Timeout(limit)),
    }

    let mut response = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let read_deadline = if response.is_empty() {
            deadline
        } else {
            deadline.min(Instant::now() + IDLE_AFTER_DATA)
        };

        let n = match timeout_at(read_deadline, stream.read(&mut chunk)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(Error::Connection(e)),
            Err(_) if response.is_empty() => return Err(Error::Timeout(limit)),
            Err(_) => {
                log::debug!("Device went quiet after {} bytes", response.len());
                break;
            }
        };
        if n == 0 {
            break;
        }

        if append_capped(&mut response, &chunk[..n], device.max_response_bytes) {
            log::warn!(
                "Response exceeded {} bytes, dropping the rest",
                device.max_response_bytes
            );
            break;
        }
    }

    Ok(response)
}

/// Append `data` up to `cap` total bytes. True when bytes were dropped.
///
/// A response that exactly fills the cap is not truncated; the next read
/// tells whether more was coming.
fn append_capped(response: &mut Vec<u8>, data: &[u8], cap: usize) -> bool {
    let room = cap.saturating_sub(response.len());
    if data.len() > room {
        response.extend_from_slice(&data[..room]);
        return true;
    }
    response.extend_from_slice(data);
    false
}

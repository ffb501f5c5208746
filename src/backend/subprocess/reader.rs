//! Line-delimited JSON reading for the subprocess backend

use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};

use crate::error::{BridgeError, Result};

use super::config::MAX_STDERR_CAPTURE;

/// Read JSON values from CLI stdout, one per complete object
///
/// A JSON object split across lines is accumulated until it parses. Input that
/// grows past `max_buffer_size` without parsing is reported and discarded.
pub fn read_json_lines<R>(
    mut reader: R,
    max_buffer_size: usize,
) -> impl Stream<Item = Result<serde_json::Value>> + Send
where
    R: AsyncBufRead + Unpin + Send,
{
    async_stream::stream! {
        let mut json_buffer = String::new();
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if json_buffer.is_empty() && !trimmed.starts_with('{') {
                        log::debug!("Skipping non-JSON CLI output: {trimmed}");
                        continue;
                    }

                    // Accumulate partial JSON until we can parse it
                    json_buffer.push_str(trimmed);

                    if json_buffer.len() > max_buffer_size {
                        json_buffer.clear();
                        yield Err(BridgeError::json_overflow(max_buffer_size));
                        continue;
                    }

                    if let Ok(data) = serde_json::from_str::<serde_json::Value>(&json_buffer) {
                        json_buffer.clear();
                        yield Ok(data);
                    }
                }
                Err(e) => {
                    yield Err(BridgeError::Io(e));
                    break;
                }
            }
        }

        if !json_buffer.is_empty() {
            log::debug!("Discarding {} bytes of incomplete CLI output", json_buffer.len());
        }
    }
}

/// Drain stderr, keeping at most [`MAX_STDERR_CAPTURE`] bytes
pub async fn capture_stderr<R>(mut stderr: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut buffer = vec![0u8; 4096];

    loop {
        match stderr.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_STDERR_CAPTURE.saturating_sub(captured.len());
                captured.extend_from_slice(&buffer[..n.min(room)]);
            }
        }
    }

    String::from_utf8_lossy(&captured).trim().to_string()
}

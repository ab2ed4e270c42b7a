use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::record::ProcessRecord;

/// Buffered lines are released once this many have accumulated.
const BATCH_LINES: usize = 10;
/// Or once this long has passed since the last flush.
const BATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Read one child stream to EOF, decoding lossily and appending batches to the
/// record's log stream. On EOF, read error, or cancellation the remaining
/// buffer is flushed once before returning; malformed bytes never abort the
/// task.
pub(crate) async fn drain_stream<R>(
    reader: R,
    record: Arc<ProcessRecord>,
    is_error: bool,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw: Vec<u8> = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut last_flush = Instant::now();

    loop {
        raw.clear();
        tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut raw) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        buffer.push(decode_line(&raw));
                        if buffer.len() >= BATCH_LINES
                            || last_flush.elapsed() >= BATCH_INTERVAL
                        {
                            flush(&record, is_error, &mut buffer);
                            last_flush = Instant::now();
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            pid = record.pid(),
                            is_error,
                            error = %e,
                            "error reading child stream"
                        );
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(BATCH_INTERVAL), if !buffer.is_empty() => {
                flush(&record, is_error, &mut buffer);
                last_flush = Instant::now();
            }
        }
    }

    flush(&record, is_error, &mut buffer);
}

fn flush(record: &ProcessRecord, is_error: bool, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let stream = if is_error {
        record.logs().stderr()
    } else {
        record.logs().stdout()
    };
    stream.append_batch(buffer);
    buffer.clear();
}

/// Lossy decode with trailing line terminators stripped. Undecodable bytes
/// become replacement characters rather than killing the drain.
fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches(['\n', '\r']).to_string()
}

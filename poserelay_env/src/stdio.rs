//! JSON-lines transport over stdin/stdout for the standalone relay process.

use crate::error::TransportError;
use crate::transport::PoseTransport;
use crate::types::{RelayOutput, Snapshot};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::warn;

/// Transport that reads one JSON-encoded [`Snapshot`] per stdin line and
/// writes one JSON-encoded [`RelayOutput`] per stdout line.
///
/// Malformed input lines are logged and skipped - a producer glitch must
/// not take the relay down. EOF on stdin is reported as stream closure.
pub struct JsonLineTransport {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    stdout: Mutex<Stdout>,
}

impl JsonLineTransport {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for JsonLineTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PoseTransport for JsonLineTransport {
    async fn recv_snapshot(&self) -> Option<Snapshot> {
        let mut lines = self.lines.lock().await;

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Snapshot>(&line) {
                        Ok(snapshot) => return Some(snapshot),
                        Err(err) => {
                            warn!(%err, "skipping malformed snapshot line");
                        }
                    }
                }
                Ok(None) => return None, // EOF
                Err(err) => {
                    warn!(%err, "stdin read failed, treating as closed");
                    return None;
                }
            }
        }
    }

    async fn publish(&self, output: RelayOutput) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(&output)?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

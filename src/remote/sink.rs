//! Per-node log sink for detached process output

use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// Destination for a detached process' output lines
///
/// Lines are always emitted as tracing events tagged with the label, and
/// appended to `file` when one is set.
#[derive(Clone, Debug)]
pub struct LogSink {
    label: String,
    file: Option<PathBuf>,
}

impl LogSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Record one output line
    pub async fn line(&self, stream: &str, line: &str) {
        info!(job = %self.label, stream, "{}", line);

        if let Some(path) = &self.file {
            let result = async {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                file.write_all(format!("{line}\n").as_bytes()).await
            }
            .await;

            if let Err(e) = result {
                warn!("Failed to append to {}: {}", path.display(), e);
            }
        }
    }

    /// Forward every line of `reader` until EOF
    pub async fn forward<R>(self, stream: &'static str, reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => self.line(stream, &line).await,
                Ok(None) => break,
                Err(e) => {
                    warn!(job = %self.label, "Error reading {}: {}", stream, e);
                    break;
                }
            }
        }
    }
}

use anyhow::Result;
use std::sync::Arc;
use threshd_common::types::AlertEvent;
use threshd_eval::engine::ThresholdEngine;
use threshd_eval::loader;
use threshd_eval::sink::ChannelSink;
use threshd_eval::ThresholdError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::config::ServerConfig;
use crate::input::{self, InputRecord};

/// Counters reported when the input stream ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub thresholds: usize,
    pub rejected_thresholds: usize,
    pub samples: usize,
    pub skipped_lines: usize,
    pub removed_states: usize,
    pub evaluation_errors: usize,
    pub events_written: usize,
    pub reloads: usize,
    /// Whether the run ended on [`Control::Shutdown`] instead of EOF
    pub interrupted: bool,
}

/// Requests delivered to a running pipeline.
#[derive(Debug)]
pub enum Control {
    /// Swap in the thresholds of a freshly loaded configuration. States of
    /// unchanged thresholds survive.
    Reload(Box<ServerConfig>),
    /// Stop reading input, flush pending events and return.
    Shutdown,
}

/// Reads sample lines from `reader` until EOF, evaluates them against the
/// configured thresholds and writes every emitted event to `output` as one
/// JSON object per line.
///
/// Malformed lines (including lines that are not UTF-8) and rejected
/// samples are logged and skipped. Only I/O failures on `reader` or `output`
/// end the run early.
pub async fn run<R, W>(config: &ServerConfig, reader: R, output: W) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (_controls_tx, controls) = mpsc::unbounded_channel();
    run_with_control(config, reader, output, controls).await
}

/// Like [`run`], but also reacts to [`Control`] requests between lines.
pub async fn run_with_control<R, W>(
    config: &ServerConfig,
    mut reader: R,
    output: W,
    mut controls: UnboundedReceiver<Control>,
) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let loaded = loader::build_thresholds(&config.thresholds, &config.events);
    let mut summary = RunSummary {
        thresholds: loaded.thresholds.len(),
        rejected_thresholds: loaded.rejected.len(),
        ..RunSummary::default()
    };
    tracing::info!(
        thresholds = summary.thresholds,
        rejected = summary.rejected_thresholds,
        "Thresholds loaded"
    );

    let (sink, events) = ChannelSink::new();
    let engine = ThresholdEngine::new(loaded.thresholds, Arc::new(sink));
    let writer = tokio::spawn(write_events(events, output));

    // Control requests are handled before any input that is already
    // buffered. A partially read line stays in `buf` when a request wins the
    // select, and the next read_until appends the rest.
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    loop {
        let read = tokio::select! {
            biased;
            Some(control) = controls.recv() => {
                match control {
                    Control::Shutdown => {
                        tracing::info!(line = line_no, "Shutdown requested, stopping input");
                        summary.interrupted = true;
                        break;
                    }
                    Control::Reload(next) => {
                        reload(&engine, &next, &mut summary);
                        continue;
                    }
                }
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            break;
        }
        line_no += 1;

        let record = match decode_line(&buf) {
            Ok(line) => input::parse_line(line).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        buf.clear();

        let record = match record {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Skipping malformed input line");
                summary.skipped_lines += 1;
                continue;
            }
        };

        match record {
            InputRecord::Sample(sample_line) => {
                summary.samples += 1;
                let resource = sample_line.resource();
                let sample = sample_line.sample();
                for result in engine.ingest(&resource, &sample_line.ds, &sample) {
                    if let Err(e) = result {
                        log_evaluation_error(line_no, &e);
                        summary.evaluation_errors += 1;
                    }
                }
            }
            InputRecord::RemoveResource { remove_resource } => {
                summary.removed_states += engine.remove_resource(&remove_resource);
            }
        }
    }

    // Dropping the engine drops the sink, which closes the event channel.
    drop(engine);
    summary.events_written = writer
        .await
        .map_err(|e| anyhow::anyhow!("Event writer task failed: {e}"))??;

    tracing::info!(
        samples = summary.samples,
        skipped = summary.skipped_lines,
        events = summary.events_written,
        "Input finished"
    );
    Ok(summary)
}

/// Strips the line terminator (`\n` or `\r\n`) and checks the encoding.
fn decode_line(raw: &[u8]) -> std::result::Result<&str, std::str::Utf8Error> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw)
}

fn reload(engine: &ThresholdEngine, config: &ServerConfig, summary: &mut RunSummary) {
    let loaded = loader::build_thresholds(&config.thresholds, &config.events);
    summary.thresholds = loaded.thresholds.len();
    summary.rejected_thresholds = loaded.rejected.len();
    summary.reloads += 1;
    engine.replace_definitions(loaded.thresholds);
    tracing::info!(
        thresholds = summary.thresholds,
        rejected = summary.rejected_thresholds,
        "Thresholds reloaded"
    );
}

async fn write_events<W>(mut events: UnboundedReceiver<AlertEvent>, mut output: W) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0usize;
    while let Some(event) = events.recv().await {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        written += 1;
    }
    output.flush().await?;
    Ok(written)
}

fn log_evaluation_error(line_no: usize, error: &ThresholdError) {
    match error {
        ThresholdError::Delivery { .. } => {
            tracing::error!(line = line_no, error = %error, "Event could not be delivered")
        }
        _ => tracing::warn!(line = line_no, error = %error, "Sample rejected"),
    }
}

//! Raw stream capture to disk
//!
//! The simulation loop hands chunks of sink bytes to a background thread
//! over a bounded channel; the thread appends them to a `.bin` file. The
//! file holds the byte stream exactly as the host received it, frame
//! headers included, so it can be fed back through the frame decoder.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

/// Chunks buffered between the simulation loop and the writer thread
const CHANNEL_CAPACITY: usize = 64;

/// `capture_YYYYMMDD_HHMMSS.bin` for the given instant
pub fn file_name_at(time: DateTime<Utc>) -> String {
    time.format("capture_%Y%m%d_%H%M%S.bin").to_string()
}

/// Capture file name for the current time
pub fn default_file_name() -> String {
    file_name_at(Utc::now())
}

/// Handle to the capture writer thread
pub struct CaptureWriter {
    path: PathBuf,
    sender: Option<Sender<Vec<u8>>>,
    thread: Option<JoinHandle<Result<u64>>>,
}

impl CaptureWriter {
    /// Create the file (and its parent directory) and spawn the writer thread
    pub fn start(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create capture directory {}", parent.display())
                })?;
            }
        }
        let file = File::create(&path)
            .with_context(|| format!("Failed to create capture file {}", path.display()))?;

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let thread_path = path.clone();
        let thread = std::thread::Builder::new()
            .name("capture-writer".into())
            .spawn(move || write_loop(BufWriter::new(file), receiver, &thread_path))
            .context("Failed to spawn capture writer thread")?;

        tracing::info!(path = %path.display(), "Capture started");
        Ok(Self {
            path,
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a chunk; blocks while the channel is full
    pub fn send(&self, chunk: Vec<u8>) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("capture writer already finished"))?;
        sender
            .send(chunk)
            .map_err(|_| anyhow!("capture writer thread stopped"))
    }

    /// Close the channel, wait for the thread and return the bytes written
    pub fn finish(mut self) -> Result<u64> {
        self.join()
    }

    fn join(&mut self) -> Result<u64> {
        drop(self.sender.take());
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("capture writer thread panicked"))?,
            None => Ok(0),
        }
    }
}

impl Drop for CaptureWriter {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            tracing::error!(error = %e, "Capture writer failed");
        }
    }
}

fn write_loop(mut writer: BufWriter<File>, receiver: Receiver<Vec<u8>>, path: &Path) -> Result<u64> {
    let mut written = 0u64;
    for chunk in receiver.iter() {
        writer
            .write_all(&chunk)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written += chunk.len() as u64;
    }
    writer.flush().context("Failed to flush capture file")?;
    tracing::info!(path = %path.display(), bytes = written, "Capture finished");
    Ok(written)
}

use std::path::PathBuf;

use async_trait::async_trait;
use ep_record::Record;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::{Sink, SinkError};

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, record: &Record) -> Result<(), SinkError> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    Ok(())
}

/// One JSON object per line on standard output.
pub struct ConsoleSink {
    out: Option<BufWriter<tokio::io::Stdout>>,
    exported: u64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { out: None, exported: 0 }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        self.out.get_or_insert_with(|| BufWriter::new(tokio::io::stdout()));
        Ok(())
    }

    async fn export_item(&mut self, record: Record) -> Result<(), SinkError> {
        let out = self.out.as_mut().ok_or(SinkError::NotOpen("console"))?;
        write_line(out, &record).await?;
        self.exported += 1;
        Ok(())
    }

    async fn export_items(&mut self, records: Vec<Record>) -> Result<(), SinkError> {
        let out = self.out.as_mut().ok_or(SinkError::NotOpen("console"))?;
        let count = records.len() as u64;
        for record in &records {
            write_line(out, record).await?;
        }
        // Flush per batch so a reader sees whole cycles.
        out.flush().await?;
        self.exported += count;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut out) = self.out.take() {
            out.flush().await?;
        }
        tracing::debug!(exported = self.exported, "Console sink closed");
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
pub struct FileSink {
    path: PathBuf,
    file: Option<BufWriter<tokio::fs::File>>,
    exported: u64,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: None, exported: 0 }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        if self.file.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(&self.path).await?;
        self.file = Some(BufWriter::new(file));
        tracing::debug!(path = %self.path.display(), "File sink opened");
        Ok(())
    }

    async fn export_item(&mut self, record: Record) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or(SinkError::NotOpen("file"))?;
        write_line(file, &record).await?;
        self.exported += 1;
        Ok(())
    }

    async fn export_items(&mut self, records: Vec<Record>) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or(SinkError::NotOpen("file"))?;
        let count = records.len() as u64;
        for record in &records {
            write_line(file, record).await?;
        }
        file.flush().await?;
        self.exported += count;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.get_mut().sync_all().await?;
        }
        tracing::debug!(path = %self.path.display(), exported = self.exported, "File sink closed");
        Ok(())
    }
}

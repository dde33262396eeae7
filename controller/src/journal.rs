use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::warn;

use coolwatch_common::{record::HEADER, ObservationRecord};

/// Append-only TSV observation log. Clones share the same file and lock.
#[derive(Clone)]
pub struct RecordLog {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl RecordLog {
    /// Truncates `path` and writes the header row.
    pub async fn create(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, format!("{HEADER}\n"))
            .await
            .with_context(|| format!("problem creating output file {}", path.display()))?;

        Ok(Self {
            path: Arc::new(path),
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        self.path.as_ref()
    }

    /// Reopens the file, appends one row and flushes it to disk.
    pub async fn append(&self, record: &ObservationRecord) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.path.as_ref())
            .await?;
        file.write_all(format!("{}\n", record.to_tsv()).as_bytes())
            .await?;
        file.flush().await?;
        file.sync_data().await
    }

    /// Like [`RecordLog::append`] but only warns on failure; a lost row never stops polling.
    pub async fn record(&self, record: ObservationRecord) {
        if let Err(err) = self.append(&record).await {
            warn!(
                "problem writing to output file {}: {err}",
                self.path.display()
            );
        }
    }

    pub async fn note(&self, note: impl Into<String>) {
        self.record(ObservationRecord::note(note)).await;
    }
}

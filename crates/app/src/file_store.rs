use std::path::{Path, PathBuf};

use api_types::{
    import::{ImportRequest, ImportSummary},
    transaction::{RecordId, RecordPatch, TransactionRecord},
};
use engine::{EngineError, RecordStore, ResultEngine};
use tokio::sync::Mutex;

/// [`RecordStore`] over a JSON file holding the record array.
///
/// A missing file reads as an empty list. Writes rewrite the whole file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    async fn load(&self) -> ResultEngine<Vec<TransactionRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(storage(&self.path, err)),
        };
        serde_json::from_str(&content).map_err(|err| storage(&self.path, err))
    }

    async fn save(&self, records: &[TransactionRecord]) -> ResultEngine<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| storage(parent, err))?;
        }
        let payload =
            serde_json::to_string_pretty(records).map_err(|err| storage(&self.path, err))?;
        tokio::fs::write(&self.path, payload)
            .await
            .map_err(|err| storage(&self.path, err))
    }
}

impl RecordStore for FileStore {
    async fn fetch_records(&self) -> ResultEngine<Vec<TransactionRecord>> {
        self.load().await
    }

    async fn update_record(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> ResultEngine<TransactionRecord> {
        let _write = self.write.lock().await;
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        patch.apply_to(record);
        let updated = record.clone();
        self.save(&records).await?;
        Ok(updated)
    }

    async fn delete_record(&self, id: &RecordId) -> ResultEngine<()> {
        let _write = self.write.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| &r.id != id);
        if records.len() == before {
            return Err(EngineError::NotFound(id.to_string()));
        }
        self.save(&records).await
    }

    async fn import_records(&self, request: &ImportRequest) -> ResultEngine<ImportSummary> {
        tracing::warn!(file = %request.file_name, "import requested on the file backend");
        Err(EngineError::Validation(
            "the file backend cannot import statements".to_string(),
        ))
    }
}

fn storage(path: &Path, err: impl std::fmt::Display) -> EngineError {
    EngineError::Server(format!("{}: {err}", path.display()))
}

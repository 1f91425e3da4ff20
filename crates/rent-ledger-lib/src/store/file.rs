use super::{BillStore, Table};
use crate::data_structures::{Bill, BillPatch, MonthKey};
use crate::error::StoreResult;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Local-only backend: the whole table lives in one JSON document.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_table(&self) -> StoreResult<Table> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Table::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Table::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_table(&self, table: &Table) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl BillStore for JsonFileStore {
    async fn select_month(&self, month: MonthKey) -> StoreResult<Vec<Bill>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_table().await?.select_month(month))
    }

    async fn select_months(&self, months: &[MonthKey]) -> StoreResult<Vec<Bill>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_table().await?.select_months(months))
    }

    async fn insert(&self, drafts: &[Bill]) -> StoreResult<Vec<Bill>> {
        let _guard = self.lock.lock().await;
        let mut table = self.read_table().await?;
        let rows = table.insert(drafts)?;
        self.write_table(&table).await?;
        tracing::debug!("Wrote {} new bills to {}", rows.len(), self.path.display());
        Ok(rows)
    }

    async fn update_by_id(&self, id: i64, patch: &BillPatch) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut table = self.read_table().await?;
        table.update_by_id(id, patch)?;
        self.write_table(&table).await
    }

    async fn update_month(&self, month: MonthKey, patch: &BillPatch) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut table = self.read_table().await?;
        table.update_month(month, patch);
        self.write_table(&table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn month(key: &str) -> MonthKey {
        MonthKey::parse(key).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("bills.json"));

        assert!(store.select_month(month("2025-01")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("bills.json");

        let store = JsonFileStore::new(&path);
        let rows = store
            .insert(&[Bill::draft(1, month("2025-01")), Bill::draft(2, month("2025-01"))])
            .await
            .unwrap();
        store
            .update_by_id(rows[1].id.unwrap(), &BillPatch::paid(true))
            .await
            .unwrap();

        let reopened = JsonFileStore::new(&path);
        let selected = reopened.select_month(month("2025-01")).await.unwrap();
        assert_eq!(selected.len(), 2);
        assert!(!selected[0].is_paid);
        assert!(selected[1].is_paid);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_insert_conflict_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("bills.json"));
        store.insert(&[Bill::draft(1, month("2025-01"))]).await.unwrap();

        let err = store
            .insert(&[Bill::draft(1, month("2025-01"))])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.select_month(month("2025-01")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"{\"bills\": [").unwrap();

        let store = JsonFileStore::new(temp_file.path());
        let err = store.select_month(month("2025-01")).await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}

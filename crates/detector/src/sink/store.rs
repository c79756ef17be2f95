//! JSON 파일 인시던트 저장소
//!
//! 저장 형식:
//! ```json
//! {
//!   "workflow_name": "Log Analysis Incident Workflow",
//!   "created_at": "2024-01-15T10:30:45Z",
//!   "last_updated": "2024-01-15T10:31:02Z",
//!   "incidents": [ ... ]
//! }
//! ```
//!
//! 기존 항목은 `serde_json::Value` 그대로 보존하므로 알 수 없는 필드나 순서가
//! 바뀌지 않습니다. 기록은 임시 파일에 쓴 뒤 rename하여 교체합니다.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use logwarden_core::types::Incident;

use super::IncidentSink;
use crate::error::DetectorError;

/// 새 문서의 워크플로 이름
pub const WORKFLOW_NAME: &str = "Log Analysis Incident Workflow";

/// 저장 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentLog {
    /// 워크플로 이름
    pub workflow_name: String,
    /// 문서 생성 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 추가 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// 저장된 인시던트 (추가 순서)
    #[serde(default)]
    pub incidents: Vec<serde_json::Value>,
}

impl IncidentLog {
    /// 빈 문서를 만듭니다.
    pub fn empty(created_at: DateTime<Utc>) -> Self {
        Self {
            workflow_name: WORKFLOW_NAME.to_owned(),
            created_at,
            last_updated: None,
            incidents: Vec::new(),
        }
    }
}

/// 추가 전용 JSON 파일 저장소
pub struct JsonFileStore {
    path: PathBuf,
    /// 읽기-수정-쓰기 구간 직렬화
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// 저장소를 만듭니다. 파일은 [`init`](Self::init)이나 첫 기록 때 생성됩니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// 저장 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 파일이 없으면 빈 문서를 만듭니다. 이미 있으면 건드리지 않습니다.
    pub async fn init(&self) -> Result<(), DetectorError> {
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        self.write_atomic(&IncidentLog::empty(Utc::now())).await?;
        info!(path = %self.path.display(), "initialized incident store");
        Ok(())
    }

    /// 저장된 문서를 읽습니다.
    pub async fn load(&self) -> Result<IncidentLog, DetectorError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.store_err(format!("read failed: {e}")))?;
        serde_json::from_str(&content).map_err(|e| self.store_err(format!("invalid document: {e}")))
    }

    /// 인시던트 하나를 문서 끝에 추가합니다.
    pub async fn append(&self, incident: &Incident) -> Result<(), DetectorError> {
        let _guard = self.write_lock.lock().await;

        let mut log = if tokio::fs::try_exists(&self.path).await? {
            self.load().await?
        } else {
            IncidentLog::empty(Utc::now())
        };

        log.incidents.push(serde_json::to_value(incident)?);
        log.last_updated = Some(Utc::now());
        self.write_atomic(&log).await?;

        debug!(
            path = %self.path.display(),
            incident_id = %incident.incident_id,
            total = log.incidents.len(),
            "incident stored"
        );
        Ok(())
    }

    async fn write_atomic(&self, log: &IncidentLog) -> Result<(), DetectorError> {
        let body = serde_json::to_vec_pretty(log)?;
        let tmp = self.temp_path();
        if let Err(e) = tokio::fs::write(&tmp, &body).await {
            return Err(self.store_err(format!("write failed: {e}")));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.store_err(format!("rename failed: {e}")));
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "incidents.json".to_owned());
        let tmp_name = format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4());
        match self.path.parent() {
            Some(parent) => parent.join(tmp_name),
            None => PathBuf::from(tmp_name),
        }
    }

    fn store_err(&self, reason: String) -> DetectorError {
        DetectorError::Store {
            path: self.path.display().to_string(),
            reason,
        }
    }
}

impl IncidentSink for JsonFileStore {
    fn name(&self) -> &str {
        "store"
    }

    async fn deliver(&self, incident: &Incident) -> Result<(), DetectorError> {
        self.append(incident).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{IncidentBuilder, IncidentTemplate};

    fn incident(n: u32) -> Incident {
        IncidentBuilder::new(IncidentTemplate::XSS, Utc::now())
            .description(format!("xss #{n}"))
            .build()
    }

    #[tokio::test]
    async fn init_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("n8n-workflow.json"));
        store.init().await.unwrap();

        let log = store.load().await.unwrap();
        assert_eq!(log.workflow_name, WORKFLOW_NAME);
        assert!(log.incidents.is_empty());
        assert!(log.last_updated.is_none());
    }

    #[tokio::test]
    async fn init_keeps_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store.json"));
        store.append(&incident(1)).await.unwrap();
        store.init().await.unwrap();
        assert_eq!(store.load().await.unwrap().incidents.len(), 1);
    }

    #[tokio::test]
    async fn append_preserves_order_and_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(
            &path,
            r#"{"workflow_name":"legacy","created_at":"2024-01-15T10:30:45Z",
                "incidents":[{"incident_id":"OLD-1","custom":"kept"}]}"#,
        )
        .await
        .unwrap();

        let store = JsonFileStore::new(&path);
        store.append(&incident(1)).await.unwrap();
        store.append(&incident(2)).await.unwrap();

        let log = store.load().await.unwrap();
        assert_eq!(log.workflow_name, "legacy");
        assert_eq!(log.incidents.len(), 3);
        assert_eq!(log.incidents[0]["custom"], "kept");
        assert_eq!(log.incidents[1]["description"], "xss #1");
        assert_eq!(log.incidents[2]["description"], "xss #2");
        assert!(log.last_updated.is_some());
    }

    #[tokio::test]
    async fn append_to_corrupt_document_fails_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = JsonFileStore::new(&path);
        let err = store.append(&incident(1)).await.unwrap_err();
        assert!(matches!(err, DetectorError::Store { .. }));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "not json");
    }

    #[tokio::test]
    async fn append_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing").join("store.json"));
        assert!(store.append(&incident(1)).await.is_err());
    }

    #[tokio::test]
    async fn no_temp_files_are_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store.json"));
        store.append(&incident(1)).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["store.json".to_owned()]);
    }
}

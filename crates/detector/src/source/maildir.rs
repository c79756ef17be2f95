//! 메일 디렉토리 소스
//!
//! 디렉토리에 새로 나타난 파일 하나를 원본 이메일 하나로 읽습니다.
//! 이미 읽은 파일 이름은 기억해 두고 다시 읽지 않습니다. 디렉토리에서
//! 사라진 파일 이름은 스캔할 때마다 잊습니다. 점(`.`)으로 시작하는 파일은
//! 작성 중인 임시 파일로 보고 건너뜁니다.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{LogSource, source_err};
use crate::config::SourceKind;
use crate::error::DetectorError;

/// 메일 디렉토리 소스
#[derive(Debug)]
pub struct MailDirSource {
    name: String,
    dir: PathBuf,
    start_at_end: bool,
    primed: bool,
    seen: HashSet<OsString>,
}

impl MailDirSource {
    /// 새 메일 디렉토리 소스를 생성합니다.
    ///
    /// `start_at_end`가 참이면 첫 스캔 때 이미 있던 파일을 읽지 않고 기억만 합니다.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, start_at_end: bool) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            start_at_end,
            primed: false,
            seen: HashSet::new(),
        }
    }

    /// 감시 중인 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 지금까지 읽은 파일 수
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    async fn list_new(&mut self) -> Result<Vec<(OsString, PathBuf)>, DetectorError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| source_err(&self.name, format!("{}: {e}", self.dir.display())))?;

        let mut fresh = Vec::new();
        let mut present = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| source_err(&self.name, format!("read_dir failed: {e}")))?
        {
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with('.') {
                continue;
            }
            if self.seen.contains(&file_name) {
                present.insert(file_name);
                continue;
            }
            match entry.file_type().await {
                Ok(ft) if ft.is_file() => fresh.push((file_name, entry.path())),
                Ok(_) => {}
                Err(e) => warn!(source = %self.name, path = %entry.path().display(), error = %e, "cannot stat mail file"),
            }
        }
        let before = self.seen.len();
        self.seen.retain(|name| present.contains(name));
        if self.seen.len() < before {
            debug!(source = %self.name, forgotten = before - self.seen.len(), "forgot removed mail files");
        }

        // 도착 순서를 알 수 없으므로 이름순으로 고정합니다.
        fresh.sort();
        Ok(fresh)
    }
}

impl LogSource for MailDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Email
    }

    fn label(&self) -> &str {
        &self.name
    }

    async fn read_new(&mut self) -> Result<Vec<String>, DetectorError> {
        let fresh = self.list_new().await?;

        if !self.primed {
            self.primed = true;
            if self.start_at_end {
                debug!(source = %self.name, skipped = fresh.len(), "skipping existing mail");
                self.seen.extend(fresh.into_iter().map(|(name, _)| name));
                return Ok(Vec::new());
            }
        }

        let mut messages = Vec::with_capacity(fresh.len());
        for (file_name, path) in fresh {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    messages.push(String::from_utf8_lossy(&bytes).into_owned());
                    self.seen.insert(file_name);
                }
                // 다음 주기에 다시 시도
                Err(e) => warn!(source = %self.name, path = %path.display(), error = %e, "failed to read mail file"),
            }
        }

        debug!(source = %self.name, messages = messages.len(), "read new mail");
        Ok(messages)
    }
}

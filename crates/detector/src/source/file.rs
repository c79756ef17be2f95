//! 파일 tail 소스
//!
//! 바이트 오프셋을 기억해 지난 주기 이후 추가된 완전한 라인만 읽습니다.
//! 개행으로 끝나지 않은 마지막 조각은 다음 주기로 미룹니다.
//!
//! # 로테이션 감지
//! - inode 변경 (logrotate `create`: 이름 변경 후 같은 경로에 새 파일)
//! - 파일 크기가 기억한 오프셋보다 작아짐 (truncation, logrotate `copytruncate`)
//!
//! 둘 중 하나라도 감지되면 처음부터 다시 읽습니다.

use std::fs::Metadata;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use super::{LogSource, source_err};
use crate::config::SourceKind;
use crate::error::DetectorError;

/// 파일 tail 소스
#[derive(Debug)]
pub struct FileTailSource {
    name: String,
    kind: SourceKind,
    path: PathBuf,
    label: String,
    start_at_end: bool,
    /// 다음에 읽을 위치. 아직 한 번도 열지 않았으면 `None`.
    offset: Option<u64>,
    /// 마지막으로 읽은 파일의 (device, inode) (Unix 전용)
    identity: Option<(u64, u64)>,
}

impl FileTailSource {
    /// 새 파일 소스를 생성합니다.
    ///
    /// `start_at_end`가 참이면 처음 열 때 기존 내용을 건너뜁니다.
    pub fn new(
        name: impl Into<String>,
        kind: SourceKind,
        path: impl Into<PathBuf>,
        start_at_end: bool,
    ) -> Self {
        let path = path.into();
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name: name.into(),
            kind,
            path,
            label,
            start_at_end,
            offset: None,
            identity: None,
        }
    }

    /// 감시 중인 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 읽기 오프셋
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    async fn read_from(&self, offset: u64, len: u64) -> Result<Vec<u8>, DetectorError> {
        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| source_err(&self.name, format!("open {}: {e}", self.path.display())))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| source_err(&self.name, format!("seek failed: {e}")))?;
        let mut buf = Vec::new();
        file.take(len - offset)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| source_err(&self.name, format!("read failed: {e}")))?;
        Ok(buf)
    }
}

impl LogSource for FileTailSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn read_new(&mut self) -> Result<Vec<String>, DetectorError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| source_err(&self.name, format!("{}: {e}", self.path.display())))?;
        if !metadata.is_file() {
            return Err(source_err(
                &self.name,
                format!("{} is not a regular file", self.path.display()),
            ));
        }
        let len = metadata.len();
        let identity = file_identity(&metadata);
        let rotated = self.identity.is_some() && identity != self.identity;
        self.identity = identity;

        let offset = match self.offset {
            None if self.start_at_end => {
                self.offset = Some(len);
                debug!(source = %self.name, offset = len, "starting at end of file");
                return Ok(Vec::new());
            }
            None => 0,
            Some(offset) if rotated => {
                info!(
                    source = %self.name,
                    path = %self.path.display(),
                    previous = offset,
                    "file replaced, reading from start"
                );
                0
            }
            Some(offset) if len < offset => {
                info!(
                    source = %self.name,
                    path = %self.path.display(),
                    previous = offset,
                    size = len,
                    "file shrank, reading from start"
                );
                0
            }
            Some(offset) => offset,
        };

        if len == offset {
            self.offset = Some(offset);
            return Ok(Vec::new());
        }

        let buf = self.read_from(offset, len).await?;
        let complete = buf.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        self.offset = Some(offset + complete as u64);

        let lines: Vec<String> = String::from_utf8_lossy(&buf[..complete])
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect();

        debug!(
            source = %self.name,
            lines = lines.len(),
            offset = offset + complete as u64,
            "read new lines"
        );
        Ok(lines)
    }
}

#[cfg(unix)]
fn file_identity(metadata: &Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_identity(_metadata: &Metadata) -> Option<(u64, u64)> {
    None
}

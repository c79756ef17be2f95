//! 로그 소스 -- 분석 주기마다 새로 쌓인 레코드를 읽어옵니다.
//!
//! # 소스 종류
//! - [`FileTailSource`]: 파일 끝에 추가된 완전한 라인 (`tail -f` 방식)
//! - [`MailDirSource`]: 디렉토리에 새로 생긴 파일 하나가 이메일 하나
//!
//! 소스는 읽기 위치를 스스로 기억합니다. 읽기 실패는 해당 주기에서 그 소스만
//! 건너뛰게 만들 뿐 분석 루프를 멈추지 않습니다.

pub mod file;
pub mod maildir;

pub use file::FileTailSource;
pub use maildir::MailDirSource;

use std::future::Future;

use crate::config::{SourceKind, SourceSpec};
use crate::error::DetectorError;
use crate::sink::BoxFuture;

/// 로그 소스 trait
pub trait LogSource: Send {
    /// 소스 이름 (설정의 `name`)
    fn name(&self) -> &str;

    /// 소스 종류 -- 분류기 선택에 사용됩니다.
    fn kind(&self) -> SourceKind;

    /// 인시던트의 `log_source` 필드에 기록할 이름
    fn label(&self) -> &str;

    /// 지난 호출 이후 새로 생긴 레코드를 읽습니다.
    fn read_new(&mut self) -> impl Future<Output = Result<Vec<String>, DetectorError>> + Send;
}

/// dyn-compatible 로그 소스 trait
///
/// `LogSource`를 구현하면 blanket impl로 자동 구현됩니다.
pub trait DynLogSource: Send {
    /// 소스 이름
    fn name(&self) -> &str;

    /// 소스 종류
    fn kind(&self) -> SourceKind;

    /// `log_source` 필드 이름
    fn label(&self) -> &str;

    /// 새 레코드를 읽습니다.
    fn read_new(&mut self) -> BoxFuture<'_, Result<Vec<String>, DetectorError>>;
}

impl<T: LogSource> DynLogSource for T {
    fn name(&self) -> &str {
        LogSource::name(self)
    }

    fn kind(&self) -> SourceKind {
        LogSource::kind(self)
    }

    fn label(&self) -> &str {
        LogSource::label(self)
    }

    fn read_new(&mut self) -> BoxFuture<'_, Result<Vec<String>, DetectorError>> {
        Box::pin(LogSource::read_new(self))
    }
}

/// 소스 명세에 맞는 소스를 엽니다.
///
/// `email` 종류는 디렉토리 감시, 나머지는 파일 tail입니다.
pub fn open_source(spec: &SourceSpec, start_at_end: bool) -> Box<dyn DynLogSource> {
    match spec.kind {
        SourceKind::Email => Box::new(MailDirSource::new(&spec.name, &spec.path, start_at_end)),
        kind => Box::new(FileTailSource::new(&spec.name, kind, &spec.path, start_at_end)),
    }
}

pub(crate) fn source_err(name: &str, reason: String) -> DetectorError {
    DetectorError::Source {
        name: name.to_owned(),
        reason,
    }
}

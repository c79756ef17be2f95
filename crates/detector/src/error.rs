//! 탐지 엔진 에러 타입
//!
//! [`DetectorError`]는 탐지 엔진 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<DetectorError> for LogwardenError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logwarden_core::error::{
    ConfigError, DeliveryError, DetectionError, LogwardenError, SourceError,
};

/// 탐지 엔진 도메인 에러
///
/// 설정, 패턴 컴파일, 인시던트 전달, 로그 소스 읽기 등
/// 엔진 내부의 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 정규식 컴파일 에러
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// 인시던트 저장소 기록 실패
    #[error("store error: {path}: {reason}")]
    Store {
        /// 저장 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 외부 알림 전송 실패
    #[error("notify error: {target}: {reason}")]
    Notify {
        /// 전송 대상 (URL 등)
        target: String,
        /// 실패 사유
        reason: String,
    },

    /// 로그 소스 읽기 실패
    #[error("source error: {name}: {reason}")]
    Source {
        /// 소스 이름
        name: String,
        /// 실패 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DetectorError> for LogwardenError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Config { field, reason } => {
                LogwardenError::Config(ConfigError::InvalidValue { field, reason })
            }
            DetectorError::Pattern(e) => {
                LogwardenError::Detection(DetectionError::Pattern(e.to_string()))
            }
            DetectorError::Store { path, reason } => {
                LogwardenError::Delivery(DeliveryError::Store { sink: path, reason })
            }
            DetectorError::Notify { target, reason } => {
                LogwardenError::Delivery(DeliveryError::Notify {
                    sink: target,
                    reason,
                })
            }
            DetectorError::Source { name, reason } => {
                LogwardenError::Source(SourceError::ReadFailed { name, reason })
            }
            DetectorError::Io(e) => LogwardenError::Io(e),
            DetectorError::Json(e) => {
                LogwardenError::Detection(DetectionError::InitFailed(e.to_string()))
            }
        }
    }
}

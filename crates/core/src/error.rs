//! 에러 타입: 도메인별 에러 정의

/// Logwarden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogwardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 탐지 엔진 에러
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),

    /// 인시던트 전달 에러
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// 로그 소스 에러
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 탐지 엔진 에러
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// 탐지 패턴 에러 (정규식 컴파일 실패 등)
    #[error("pattern error: {0}")]
    Pattern(String),

    /// 탐지 엔진 초기화 실패
    #[error("init failed: {0}")]
    InitFailed(String),
}

/// 인시던트 전달 에러
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// 영속 저장소 기록 실패
    #[error("store '{sink}' failed: {reason}")]
    Store { sink: String, reason: String },

    /// 외부 알림 전송 실패
    #[error("notifier '{sink}' failed: {reason}")]
    Notify { sink: String, reason: String },
}

/// 로그 소스 에러
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 소스를 사용할 수 없음 (파일 없음 등)
    #[error("source '{name}' unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    /// 읽기 실패
    #[error("source '{name}' read failed: {reason}")]
    ReadFailed { name: String, reason: String },
}

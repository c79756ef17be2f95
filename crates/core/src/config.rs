//! 설정 관리: logwarden.toml 파싱 및 런타임 설정
//!
//! [`LogwardenConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWARDEN_ANALYSIS_INTERVAL_SECS=5` 형식)
//! 3. 설정 파일 (`logwarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logwarden_core::error::LogwardenError> {
//! use logwarden_core::config::LogwardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogwardenConfig::load("logwarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogwardenConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwardenError};

/// 허용되는 소스 종류
pub const SOURCE_KINDS: &[&str] = &["ssh", "web", "database", "application", "email"];

/// 허용되는 발화 정책
pub const FIRE_POLICIES: &[&str] = &["reset", "keep"];

/// 허용되는 큐 드롭 정책
pub const DROP_POLICIES: &[&str] = &["oldest", "newest"];

/// Logwarden 통합 설정
///
/// `logwarden.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 분석 루프 설정
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// 탐지 도메인 임계값 설정
    #[serde(default)]
    pub detection: DetectionConfig,
    /// 인시던트 전달(sink) 설정
    #[serde(default)]
    pub sinks: SinksConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogwardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwardenError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwardenError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWARDEN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "LOGWARDEN_GENERAL_PID_FILE");

        // Analysis
        override_u64(
            &mut self.analysis.interval_secs,
            "LOGWARDEN_ANALYSIS_INTERVAL_SECS",
        );
        override_u64(
            &mut self.analysis.sweep_retention_secs,
            "LOGWARDEN_ANALYSIS_SWEEP_RETENTION_SECS",
        );
        override_bool(
            &mut self.analysis.start_at_end,
            "LOGWARDEN_ANALYSIS_START_AT_END",
        );

        // Detection
        override_u32(&mut self.detection.ssh.count, "LOGWARDEN_DETECTION_SSH_COUNT");
        override_u64(
            &mut self.detection.ssh.window_secs,
            "LOGWARDEN_DETECTION_SSH_WINDOW_SECS",
        );
        override_u32(&mut self.detection.web.count, "LOGWARDEN_DETECTION_WEB_COUNT");
        override_u64(
            &mut self.detection.web.window_secs,
            "LOGWARDEN_DETECTION_WEB_WINDOW_SECS",
        );
        override_u32(
            &mut self.detection.database.count,
            "LOGWARDEN_DETECTION_DATABASE_COUNT",
        );
        override_u64(
            &mut self.detection.database.window_secs,
            "LOGWARDEN_DETECTION_DATABASE_WINDOW_SECS",
        );

        // Sinks
        override_string(&mut self.sinks.store_path, "LOGWARDEN_SINKS_STORE_PATH");
        override_bool(
            &mut self.sinks.webhook_enabled,
            "LOGWARDEN_SINKS_WEBHOOK_ENABLED",
        );
        override_string(&mut self.sinks.webhook_url, "LOGWARDEN_SINKS_WEBHOOK_URL");
        override_u64(
            &mut self.sinks.webhook_timeout_secs,
            "LOGWARDEN_SINKS_WEBHOOK_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.sinks.queue_capacity,
            "LOGWARDEN_SINKS_QUEUE_CAPACITY",
        );
        override_string(&mut self.sinks.drop_policy, "LOGWARDEN_SINKS_DROP_POLICY");

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGWARDEN_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGWARDEN_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOGWARDEN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.analysis.interval_secs == 0 {
            return Err(invalid(
                "analysis.interval_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        for (idx, source) in self.analysis.sources.iter().enumerate() {
            if source.name.is_empty() {
                return Err(invalid(
                    &format!("analysis.sources[{idx}].name"),
                    "must not be empty".to_owned(),
                ));
            }
            if !SOURCE_KINDS.contains(&source.kind.as_str()) {
                return Err(invalid(
                    &format!("analysis.sources[{idx}].kind"),
                    format!("must be one of: {}", SOURCE_KINDS.join(", ")),
                ));
            }
            if source.path.is_empty() {
                return Err(invalid(
                    &format!("analysis.sources[{idx}].path"),
                    "must not be empty".to_owned(),
                ));
            }
        }

        let mut names: Vec<&str> = self
            .analysis
            .sources
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(invalid(
                "analysis.sources",
                "source names must be unique".to_owned(),
            ));
        }

        for (name, threshold) in [
            ("detection.ssh", &self.detection.ssh),
            ("detection.web", &self.detection.web),
            ("detection.database", &self.detection.database),
        ] {
            threshold.validate(name)?;
        }

        if self.sinks.store_path.is_empty() {
            return Err(invalid("sinks.store_path", "must not be empty".to_owned()));
        }

        if self.sinks.webhook_enabled {
            let url = self.sinks.webhook_url.as_str();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(
                    "sinks.webhook_url",
                    "must start with http:// or https:// when the webhook is enabled".to_owned(),
                ));
            }
            if self.sinks.webhook_timeout_secs == 0 {
                return Err(invalid(
                    "sinks.webhook_timeout_secs",
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        if self.sinks.queue_capacity == 0 {
            return Err(invalid(
                "sinks.queue_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if !DROP_POLICIES.contains(&self.sinks.drop_policy.as_str()) {
            return Err(invalid(
                "sinks.drop_policy",
                format!("must be one of: {}", DROP_POLICIES.join(", ")),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0".to_owned()));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> LogwardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 사용하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 분석 루프 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 스캔 주기 (초)
    pub interval_secs: u64,
    /// sweep 시 키를 유지할 최소 기간 (초)
    pub sweep_retention_secs: u64,
    /// true면 처음 열 때 파일 끝부터 읽습니다
    pub start_at_end: bool,
    /// 감시할 로그 소스 목록
    pub sources: Vec<SourceConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            sweep_retention_secs: 3600,
            start_at_end: false,
            sources: vec![
                SourceConfig::new("web", "web", "/app/logs/web.log"),
                SourceConfig::new("ssh", "ssh", "/app/logs/ssh.log"),
                SourceConfig::new("database", "database", "/app/logs/database.log"),
                SourceConfig::new("application", "application", "/app/logs/application.log"),
            ],
        }
    }
}

/// 단일 로그 소스 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 소스 이름 (로그와 메트릭에 사용)
    pub name: String,
    /// 소스 종류 (ssh, web, database, application, email)
    pub kind: String,
    /// 파일 경로 (email이면 디렉토리)
    pub path: String,
}

impl SourceConfig {
    /// 새 소스 설정을 만듭니다.
    pub fn new(name: impl Into<String>, kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            path: path.into(),
        }
    }
}

/// 탐지 도메인별 임계값 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// SSH 무차별 대입 (키: 출발지 IP)
    pub ssh: ThresholdSettings,
    /// 웹 무차별 대입 (키: 출발지 IP)
    pub web: ThresholdSettings,
    /// DB 의심 쿼리 남용 (키: 사용자명)
    pub database: ThresholdSettings,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ssh: ThresholdSettings::new(3, 60),
            web: ThresholdSettings::new(5, 120),
            database: ThresholdSettings::new(2, 300),
        }
    }
}

/// 임계값 (count, window) 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSettings {
    /// 발화에 필요한 최소 이벤트 수
    pub count: u32,
    /// 윈도우 길이 (초)
    pub window_secs: u64,
    /// 발화 후 카운터 처리 정책 (reset, keep)
    #[serde(default = "default_fire_policy")]
    pub fire_policy: String,
}

fn default_fire_policy() -> String {
    "reset".to_owned()
}

impl ThresholdSettings {
    /// 기본 발화 정책(reset)으로 임계값을 만듭니다.
    pub fn new(count: u32, window_secs: u64) -> Self {
        Self {
            count,
            window_secs,
            fire_policy: default_fire_policy(),
        }
    }

    fn validate(&self, section: &str) -> Result<(), LogwardenError> {
        if self.count == 0 {
            return Err(invalid(
                &format!("{section}.count"),
                "must be greater than 0".to_owned(),
            ));
        }
        if self.window_secs == 0 {
            return Err(invalid(
                &format!("{section}.window_secs"),
                "must be greater than 0".to_owned(),
            ));
        }
        if !FIRE_POLICIES.contains(&self.fire_policy.as_str()) {
            return Err(invalid(
                &format!("{section}.fire_policy"),
                format!("must be one of: {}", FIRE_POLICIES.join(", ")),
            ));
        }
        Ok(())
    }
}

/// 인시던트 전달 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// 인시던트 JSON 저장 파일
    pub store_path: String,
    /// 웹훅 전송 활성화
    pub webhook_enabled: bool,
    /// 웹훅 URL
    pub webhook_url: String,
    /// 웹훅 요청 타임아웃 (초)
    pub webhook_timeout_secs: u64,
    /// 전달 대기 큐 용량
    pub queue_capacity: usize,
    /// 큐 포화 시 드롭 정책 (oldest, newest)
    pub drop_policy: String,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            store_path: "n8n-workflow.json".to_owned(),
            webhook_enabled: false,
            webhook_url: "http://127.0.0.1:5678/webhook/log-analysis".to_owned(),
            webhook_timeout_secs: 10,
            queue_capacity: 1024,
            drop_policy: "oldest".to_owned(),
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

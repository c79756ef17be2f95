//! 탐지 엔진 설정
//!
//! [`DetectorConfig`]는 core의 [`LogwardenConfig`]에서 문자열로 표현된 값을
//! 엔진이 쓰는 타입(열거형, `Duration`, 경로)으로 변환한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use logwarden_core::config::LogwardenConfig;
//! use logwarden_detector::config::DetectorConfig;
//!
//! let core_config = LogwardenConfig::default();
//! let config = DetectorConfig::from_core(&core_config)?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logwarden_core::config::{LogwardenConfig, ThresholdSettings};

use crate::error::DetectorError;

/// 인시던트 큐 포화 시 드롭 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// 가장 오래된 인시던트를 드롭 (기본값)
    #[default]
    Oldest,
    /// 새 인시던트를 거부
    Newest,
}

impl DropPolicy {
    /// 설정 문자열에서 드롭 정책을 파싱합니다.
    pub fn parse(s: &str) -> Result<Self, DetectorError> {
        match s {
            "oldest" => Ok(Self::Oldest),
            "newest" => Ok(Self::Newest),
            other => Err(config_err(
                "drop_policy",
                format!("unknown drop policy '{other}'"),
            )),
        }
    }
}

/// 규칙 발화 후 카운터 처리 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirePolicy {
    /// 발화 즉시 키의 카운터를 비움. 지속 공격은 임계값을 다시 채워야 재발화합니다.
    #[default]
    Reset,
    /// 카운터를 유지. 윈도우 안에서 임계값 이상인 동안 매 이벤트마다 발화합니다.
    Keep,
}

impl FirePolicy {
    /// 설정 문자열에서 발화 정책을 파싱합니다.
    pub fn parse(s: &str) -> Result<Self, DetectorError> {
        match s {
            "reset" => Ok(Self::Reset),
            "keep" => Ok(Self::Keep),
            other => Err(config_err(
                "fire_policy",
                format!("unknown fire policy '{other}'"),
            )),
        }
    }
}

/// 로그 소스 종류 -- 어떤 분류기로 라인을 보낼지 결정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// SSH 인증 로그
    Ssh,
    /// 웹 서버 접근 로그
    Web,
    /// 데이터베이스 쿼리 로그
    Database,
    /// 애플리케이션 로그
    Application,
    /// 이메일 (파일 하나가 메시지 하나)
    Email,
}

impl SourceKind {
    /// 설정 문자열에서 소스 종류를 파싱합니다.
    pub fn parse(s: &str) -> Result<Self, DetectorError> {
        match s {
            "ssh" => Ok(Self::Ssh),
            "web" => Ok(Self::Web),
            "database" => Ok(Self::Database),
            "application" => Ok(Self::Application),
            "email" => Ok(Self::Email),
            other => Err(config_err(
                "sources.kind",
                format!("unknown source kind '{other}'"),
            )),
        }
    }

    /// 설정 파일에서 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Web => "web",
            Self::Database => "database",
            Self::Application => "application",
            Self::Email => "email",
        }
    }
}

/// 감시 대상 소스
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// 소스 이름
    pub name: String,
    /// 소스 종류
    pub kind: SourceKind,
    /// 파일 경로 (email이면 디렉토리)
    pub path: PathBuf,
}

impl SourceSpec {
    /// 새 소스 명세를 만듭니다.
    pub fn new(name: impl Into<String>, kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
        }
    }
}

/// 도메인별 임계값 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainSettings {
    /// 발화에 필요한 최소 이벤트 수
    pub count: u32,
    /// 윈도우 길이
    pub window: Duration,
    /// 발화 후 처리 정책
    pub fire_policy: FirePolicy,
}

impl DomainSettings {
    /// 기본 발화 정책(reset)으로 설정을 만듭니다.
    pub fn new(count: u32, window_secs: u64) -> Self {
        Self {
            count,
            window: Duration::from_secs(window_secs),
            fire_policy: FirePolicy::Reset,
        }
    }

    fn from_core(core: &ThresholdSettings) -> Result<Self, DetectorError> {
        Ok(Self {
            count: core.count,
            window: Duration::from_secs(core.window_secs),
            fire_policy: FirePolicy::parse(&core.fire_policy)?,
        })
    }

    fn validate(&self, domain: &str) -> Result<(), DetectorError> {
        if self.count == 0 {
            return Err(config_err(
                &format!("{domain}.count"),
                "must be greater than 0".to_owned(),
            ));
        }
        if self.window.is_zero() {
            return Err(config_err(
                &format!("{domain}.window"),
                "must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 탐지 엔진 설정
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// 스캔 주기
    pub interval: Duration,
    /// sweep 시 키를 유지할 최소 기간
    pub sweep_retention: Duration,
    /// 처음 열 때 파일 끝부터 읽을지 여부
    pub start_at_end: bool,
    /// 감시 소스 목록
    pub sources: Vec<SourceSpec>,
    /// SSH 도메인 임계값
    pub ssh: DomainSettings,
    /// 웹 도메인 임계값
    pub web: DomainSettings,
    /// DB 도메인 임계값
    pub database: DomainSettings,
    /// 인시던트 저장 파일
    pub store_path: PathBuf,
    /// 웹훅 URL (`None`이면 알림 비활성)
    pub webhook_url: Option<String>,
    /// 웹훅 요청 타임아웃
    pub webhook_timeout: Duration,
    /// 전달 큐 용량
    pub queue_capacity: usize,
    /// 전달 큐 드롭 정책
    pub drop_policy: DropPolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            sweep_retention: Duration::from_secs(3600),
            start_at_end: false,
            sources: Vec::new(),
            ssh: DomainSettings::new(3, 60),
            web: DomainSettings::new(5, 120),
            database: DomainSettings::new(2, 300),
            store_path: PathBuf::from("n8n-workflow.json"),
            webhook_url: None,
            webhook_timeout: Duration::from_secs(10),
            queue_capacity: 1024,
            drop_policy: DropPolicy::Oldest,
        }
    }
}

impl DetectorConfig {
    /// core의 `LogwardenConfig`에서 탐지 엔진 설정을 생성합니다.
    pub fn from_core(core: &LogwardenConfig) -> Result<Self, DetectorError> {
        let sources = core
            .analysis
            .sources
            .iter()
            .map(|s| Ok(SourceSpec::new(&s.name, SourceKind::parse(&s.kind)?, &s.path)))
            .collect::<Result<Vec<_>, DetectorError>>()?;

        let webhook_url = core
            .sinks
            .webhook_enabled
            .then(|| core.sinks.webhook_url.clone());

        Ok(Self {
            interval: Duration::from_secs(core.analysis.interval_secs),
            sweep_retention: Duration::from_secs(core.analysis.sweep_retention_secs),
            start_at_end: core.analysis.start_at_end,
            sources,
            ssh: DomainSettings::from_core(&core.detection.ssh)?,
            web: DomainSettings::from_core(&core.detection.web)?,
            database: DomainSettings::from_core(&core.detection.database)?,
            store_path: PathBuf::from(&core.sinks.store_path),
            webhook_url,
            webhook_timeout: Duration::from_secs(core.sinks.webhook_timeout_secs),
            queue_capacity: core.sinks.queue_capacity,
            drop_policy: DropPolicy::parse(&core.sinks.drop_policy)?,
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DetectorError> {
        const MAX_QUEUE_CAPACITY: usize = 1_000_000;

        if self.interval.is_zero() {
            return Err(config_err("interval", "must be greater than 0".to_owned()));
        }

        self.ssh.validate("ssh")?;
        self.web.validate("web")?;
        self.database.validate("database")?;

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(config_err(
                "queue_capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }

        if self.store_path.as_os_str().is_empty() {
            return Err(config_err("store_path", "must not be empty".to_owned()));
        }

        if let Some(url) = &self.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(config_err(
                    "webhook_url",
                    format!("'{url}' must start with http:// or https://"),
                ));
            }
            if self.webhook_timeout.is_zero() {
                return Err(config_err(
                    "webhook_timeout",
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        for source in &self.sources {
            if source.name.is_empty() {
                return Err(config_err("sources.name", "must not be empty".to_owned()));
            }
            if source.path.as_os_str().is_empty() {
                return Err(config_err(
                    "sources.path",
                    format!("source '{}' has an empty path", source.name),
                ));
            }
        }

        Ok(())
    }
}

/// 탐지 엔진 설정 빌더
#[derive(Default)]
pub struct DetectorConfigBuilder {
    config: DetectorConfig,
}

impl DetectorConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스캔 주기를 설정합니다.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// sweep 보존 기간을 설정합니다.
    pub fn sweep_retention(mut self, retention: Duration) -> Self {
        self.config.sweep_retention = retention;
        self
    }

    /// 파일을 끝부터 읽을지 설정합니다.
    pub fn start_at_end(mut self, start_at_end: bool) -> Self {
        self.config.start_at_end = start_at_end;
        self
    }

    /// 감시 소스를 추가합니다.
    pub fn source(mut self, source: SourceSpec) -> Self {
        self.config.sources.push(source);
        self
    }

    /// SSH 도메인 임계값을 설정합니다.
    pub fn ssh(mut self, settings: DomainSettings) -> Self {
        self.config.ssh = settings;
        self
    }

    /// 웹 도메인 임계값을 설정합니다.
    pub fn web(mut self, settings: DomainSettings) -> Self {
        self.config.web = settings;
        self
    }

    /// DB 도메인 임계값을 설정합니다.
    pub fn database(mut self, settings: DomainSettings) -> Self {
        self.config.database = settings;
        self
    }

    /// 인시던트 저장 파일을 설정합니다.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_path = path.into();
        self
    }

    /// 웹훅 URL을 설정합니다.
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.config.webhook_url = Some(url.into());
        self
    }

    /// 웹훅 타임아웃을 설정합니다.
    pub fn webhook_timeout(mut self, timeout: Duration) -> Self {
        self.config.webhook_timeout = timeout;
        self
    }

    /// 전달 큐 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 드롭 정책을 설정합니다.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.config.drop_policy = policy;
        self
    }

    /// 설정을 검증하고 `DetectorConfig`를 생성합니다.
    pub fn build(self) -> Result<DetectorConfig, DetectorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn config_err(field: &str, reason: String) -> DetectorError {
    DetectorError::Config {
        field: field.to_owned(),
        reason,
    }
}

//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 탐지 엔진, 인시던트 전달 계층, 데몬이 공유하는 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
/// 직렬화 시 대문자 문자열(`"HIGH"`)로 기록됩니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 정보성 이벤트
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적: 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 메트릭 레이블 등에 쓰는 소문자 이름을 반환합니다.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 속도 제한 대상 키의 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// 출발지 IP (SSH, 웹)
    SourceIp,
    /// 사용자명 (데이터베이스)
    Username,
    /// 이메일 발신자
    Sender,
}

impl KeyKind {
    /// 인시던트 JSON에서 키를 기록하는 필드명 (`source_ip` / `source_user` / `sender`)
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::SourceIp => "source_ip",
            Self::Username => "source_user",
            Self::Sender => "sender",
        }
    }
}

/// 탐지 종류: 인시던트의 `event_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionKind {
    /// SSH 무차별 대입
    #[serde(rename = "ssh_brute_force")]
    SshBruteForce,
    /// 웹 로그인 무차별 대입
    #[serde(rename = "web_brute_force")]
    WebBruteForce,
    /// 의심스러운 데이터베이스 쿼리 남용
    #[serde(rename = "database_abuse")]
    DatabaseAbuse,
    /// SQL 인젝션 시도
    #[serde(rename = "sql_injection")]
    SqlInjection,
    /// 크로스 사이트 스크립팅 시도
    #[serde(rename = "xss_attempt")]
    Xss,
    /// 애플리케이션 에러
    #[serde(rename = "application_error")]
    ApplicationError,
    /// 피싱 이메일
    #[serde(rename = "phishing_email")]
    PhishingEmail,
}

impl DetectionKind {
    /// 직렬화 이름과 동일한 `event_type` 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SshBruteForce => "ssh_brute_force",
            Self::WebBruteForce => "web_brute_force",
            Self::DatabaseAbuse => "database_abuse",
            Self::SqlInjection => "sql_injection",
            Self::Xss => "xss_attempt",
            Self::ApplicationError => "application_error",
            Self::PhishingEmail => "phishing_email",
        }
    }

    /// 인시던트 ID 접두어
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::SshBruteForce => "SSH-BF",
            Self::WebBruteForce => "WEB-BF",
            Self::DatabaseAbuse => "DB-ABUSE",
            Self::SqlInjection => "SQLI",
            Self::Xss => "XSS",
            Self::ApplicationError => "APP-ERR",
            Self::PhishingEmail => "PHISH",
        }
    }

    /// 임계값 기반(상태 유지) 탐지인지 여부
    pub fn is_rate_based(&self) -> bool {
        matches!(
            self,
            Self::SshBruteForce | Self::WebBruteForce | Self::DatabaseAbuse
        )
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 보안 인시던트
///
/// 규칙이 발화(fire)한 시점에 한 번 생성되어 전달 계층으로 넘어가며,
/// 이후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// 프로세스 수명 동안 유일한 인시던트 ID (예: `SSH-BF-1705314645-42`)
    pub incident_id: String,
    /// 탐지 시각
    pub timestamp: DateTime<Utc>,
    /// 심각도
    pub severity: Severity,
    /// 탐지 종류
    pub event_type: DetectionKind,
    /// 속도 제한 키 또는 출발지 (IP / 사용자명)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    /// `source_key`의 종류
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_kind: Option<KeyKind>,
    /// 사람이 읽는 설명
    pub description: String,
    /// 윈도우 내 시도 횟수 (임계값 탐지에만 존재)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_count: Option<u32>,
    /// 윈도우 길이 (예: `"60 seconds"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<String>,
    /// 발화한 탐지 규칙명
    pub detection_rule: String,
    /// 권장 조치
    pub action_taken: String,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence_score: f64,
    /// 로그 출처
    pub log_source: String,
    /// 발화를 유발한 원본 로그
    pub raw_logs: String,
    /// 도메인별 추가 필드 (예: `target_user`, `source_ip`)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} (rule: {})",
            self.severity, self.incident_id, self.description, self.detection_rule,
        )
    }
}

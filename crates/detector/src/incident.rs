//! 인시던트 생성 -- 탐지 종류별 템플릿과 ID 발급
//!
//! [`IncidentTemplate`]은 탐지 종류마다 고정된 심각도, 규칙명, 권장 조치,
//! 신뢰도, 로그 출처를 담습니다. [`IncidentBuilder`]는 템플릿에 발화 시점의
//! 값(키, 시도 횟수, 원본 로그)을 채워 [`Incident`]를 만듭니다.
//!
//! 인시던트 ID는 `{접두어}-{유닉스 초}-{프로세스 전역 시퀀스}` 형식으로,
//! 같은 초 안에 여러 번 발화해도 프로세스 수명 동안 겹치지 않습니다.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use logwarden_core::types::{DetectionKind, Incident, KeyKind, Severity};

static INCIDENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// 프로세스 안에서 유일한 인시던트 ID를 발급합니다.
pub fn next_incident_id(kind: DetectionKind, at: DateTime<Utc>) -> String {
    let seq = INCIDENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", kind.id_prefix(), at.timestamp(), seq)
}

/// 윈도우 길이를 `"60 seconds"` 형식으로 표현합니다.
pub fn format_window(window: Duration) -> String {
    format!("{} seconds", window.as_secs())
}

/// 탐지 종류별 인시던트 템플릿
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidentTemplate {
    /// 탐지 종류
    pub kind: DetectionKind,
    /// 기본 심각도
    pub severity: Severity,
    /// 탐지 규칙명
    pub detection_rule: &'static str,
    /// 권장 조치
    pub action_taken: &'static str,
    /// 신뢰도
    pub confidence_score: f64,
    /// 기본 로그 출처
    pub log_source: &'static str,
}

impl IncidentTemplate {
    /// SSH 무차별 대입
    pub const SSH_BRUTE_FORCE: Self = Self {
        kind: DetectionKind::SshBruteForce,
        severity: Severity::High,
        detection_rule: "failed_ssh_threshold",
        action_taken: "ip_block_recommended",
        confidence_score: 0.95,
        log_source: "ssh.log",
    };

    /// 웹 로그인 무차별 대입
    pub const WEB_BRUTE_FORCE: Self = Self {
        kind: DetectionKind::WebBruteForce,
        severity: Severity::Medium,
        detection_rule: "failed_web_login_threshold",
        action_taken: "rate_limit_recommended",
        confidence_score: 0.85,
        log_source: "web.log",
    };

    /// DB 의심 쿼리 남용
    pub const DATABASE_ABUSE: Self = Self {
        kind: DetectionKind::DatabaseAbuse,
        severity: Severity::High,
        detection_rule: "suspicious_query_pattern",
        action_taken: "review_privileges",
        confidence_score: 0.75,
        log_source: "database.log",
    };

    /// SQL 인젝션
    pub const SQL_INJECTION: Self = Self {
        kind: DetectionKind::SqlInjection,
        severity: Severity::High,
        detection_rule: "sql_injection_pattern",
        action_taken: "block_request",
        confidence_score: 0.90,
        log_source: "web.log",
    };

    /// 크로스 사이트 스크립팅
    pub const XSS: Self = Self {
        kind: DetectionKind::Xss,
        severity: Severity::Medium,
        detection_rule: "xss_pattern",
        action_taken: "sanitize_input",
        confidence_score: 0.80,
        log_source: "web.log",
    };

    /// 애플리케이션 에러
    pub const APPLICATION_ERROR: Self = Self {
        kind: DetectionKind::ApplicationError,
        severity: Severity::Low,
        detection_rule: "error_pattern",
        action_taken: "investigate",
        confidence_score: 0.60,
        log_source: "application.log",
    };

    /// 피싱 이메일. 심각도, 조치, 신뢰도는 점수에 따라 덮어씁니다.
    pub const PHISHING_EMAIL: Self = Self {
        kind: DetectionKind::PhishingEmail,
        severity: Severity::High,
        detection_rule: "phishing_indicator_score",
        action_taken: "quarantine_to_spam",
        confidence_score: 0.0,
        log_source: "email",
    };
}

/// 인시던트 빌더
///
/// 템플릿에서 시작하여 발화 시점의 값을 채운 뒤 [`build`](Self::build)로
/// ID를 발급받아 [`Incident`]를 생성합니다.
#[derive(Debug, Clone)]
pub struct IncidentBuilder {
    template: IncidentTemplate,
    timestamp: DateTime<Utc>,
    severity: Severity,
    action_taken: String,
    confidence_score: f64,
    log_source: String,
    source_key: Option<(KeyKind, String)>,
    description: String,
    attempt_count: Option<u32>,
    time_window: Option<String>,
    raw_logs: String,
    extra: BTreeMap<String, serde_json::Value>,
}

impl IncidentBuilder {
    /// 템플릿과 탐지 시각으로 빌더를 만듭니다.
    pub fn new(template: IncidentTemplate, timestamp: DateTime<Utc>) -> Self {
        Self {
            template,
            timestamp,
            severity: template.severity,
            action_taken: template.action_taken.to_owned(),
            confidence_score: template.confidence_score,
            log_source: template.log_source.to_owned(),
            source_key: None,
            description: String::new(),
            attempt_count: None,
            time_window: None,
            raw_logs: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// 탐지 종류
    pub fn kind(&self) -> DetectionKind {
        self.template.kind
    }

    /// 출발지 키를 설정합니다. `source_ip`/`source_user` 필드도 함께 기록됩니다.
    pub fn source(mut self, kind: KeyKind, key: impl Into<String>) -> Self {
        let key = key.into();
        self.extra.insert(
            kind.field_name().to_owned(),
            serde_json::Value::String(key.clone()),
        );
        self.source_key = Some((kind, key));
        self
    }

    /// 설명을 설정합니다.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 윈도우 내 시도 횟수와 윈도우 길이를 설정합니다.
    pub fn attempts(mut self, count: u32, window: Duration) -> Self {
        self.attempt_count = Some(count);
        self.time_window = Some(format_window(window));
        self
    }

    /// 원본 로그를 설정합니다. 앞뒤 공백은 제거됩니다.
    pub fn raw(mut self, raw: &str) -> Self {
        self.raw_logs = raw.trim().to_owned();
        self
    }

    /// 심각도를 덮어씁니다.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// 권장 조치를 덮어씁니다.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action_taken = action.into();
        self
    }

    /// 신뢰도를 덮어씁니다 (0.0 ~ 1.0으로 제한).
    pub fn confidence(mut self, score: f64) -> Self {
        self.confidence_score = score.clamp(0.0, 1.0);
        self
    }

    /// 로그 출처를 덮어씁니다.
    pub fn log_source(mut self, source: impl Into<String>) -> Self {
        self.log_source = source.into();
        self
    }

    /// 추가 필드를 기록합니다.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// ID를 발급하고 인시던트를 생성합니다.
    pub fn build(self) -> Incident {
        let (key_kind, source_key) = match self.source_key {
            Some((kind, key)) => (Some(kind), Some(key)),
            None => (None, None),
        };
        Incident {
            incident_id: next_incident_id(self.template.kind, self.timestamp),
            timestamp: self.timestamp,
            severity: self.severity,
            event_type: self.template.kind,
            source_key,
            key_kind,
            description: self.description,
            attempt_count: self.attempt_count,
            time_window: self.time_window,
            detection_rule: self.template.detection_rule.to_owned(),
            action_taken: self.action_taken,
            confidence_score: self.confidence_score,
            log_source: self.log_source,
            raw_logs: self.raw_logs,
            extra: self.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn incident_ids_are_unique_within_same_second() {
        let now = Utc::now();
        let ids: HashSet<String> = (0..1000)
            .map(|_| next_incident_id(DetectionKind::SshBruteForce, now))
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn incident_id_has_prefix_and_timestamp() {
        let at = DateTime::from_timestamp(1_705_314_645, 0).unwrap();
        let id = next_incident_id(DetectionKind::DatabaseAbuse, at);
        assert!(id.starts_with("DB-ABUSE-1705314645-"));
    }

    #[test]
    fn window_is_rendered_in_seconds() {
        assert_eq!(format_window(Duration::from_secs(60)), "60 seconds");
    }

    #[test]
    fn builder_applies_template_defaults() {
        let incident = IncidentBuilder::new(IncidentTemplate::SSH_BRUTE_FORCE, Utc::now())
            .source(KeyKind::SourceIp, "10.0.0.5")
            .description("SSH brute force attack detected from 10.0.0.5")
            .attempts(3, Duration::from_secs(60))
            .raw("  Failed password for root from 10.0.0.5 port 22 ssh2\n")
            .build();

        assert_eq!(incident.severity, Severity::High);
        assert_eq!(incident.event_type, DetectionKind::SshBruteForce);
        assert_eq!(incident.detection_rule, "failed_ssh_threshold");
        assert_eq!(incident.action_taken, "ip_block_recommended");
        assert_eq!(incident.log_source, "ssh.log");
        assert_eq!(incident.attempt_count, Some(3));
        assert_eq!(incident.time_window.as_deref(), Some("60 seconds"));
        assert_eq!(incident.source_key.as_deref(), Some("10.0.0.5"));
        assert_eq!(incident.extra["source_ip"], "10.0.0.5");
        assert!(!incident.raw_logs.ends_with('\n'));
    }

    #[test]
    fn builder_overrides_apply() {
        let incident = IncidentBuilder::new(IncidentTemplate::PHISHING_EMAIL, Utc::now())
            .severity(Severity::Medium)
            .action("flag_for_review")
            .confidence(1.7)
            .log_source("mailbox")
            .extra("sender", "noreply@example.com")
            .build();
        assert_eq!(incident.severity, Severity::Medium);
        assert_eq!(incident.action_taken, "flag_for_review");
        assert_eq!(incident.confidence_score, 1.0);
        assert_eq!(incident.log_source, "mailbox");
        assert!(incident.attempt_count.is_none());
        assert_eq!(incident.extra["sender"], "noreply@example.com");
    }
}

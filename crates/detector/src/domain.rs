//! 탐지 도메인 -- 임계값 기반 탐지 단위
//!
//! SSH, 웹, DB 세 도메인은 각자 [`RuleEvaluator`]와 카운터를 소유하며
//! 상태를 공유하지 않습니다. 같은 IP라도 SSH 임계값 도달이 웹 카운터에
//! 영향을 주지 않습니다.
//!
//! 도메인 간 차이는 키 종류, 임계값, 인시던트 템플릿뿐입니다.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use logwarden_core::types::{DetectionKind, Incident, KeyKind};

use crate::config::{DetectorConfig, DomainSettings};
use crate::error::DetectorError;
use crate::incident::{IncidentBuilder, IncidentTemplate};
use crate::rule::{Evaluation, RuleEvaluator};
use crate::window::window_start;

/// 도메인 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainId {
    /// SSH 무차별 대입 (키: 출발지 IP)
    Ssh,
    /// 웹 로그인 무차별 대입 (키: 출발지 IP)
    Web,
    /// DB 의심 쿼리 남용 (키: 사용자명)
    Database,
}

impl DomainId {
    /// 모든 도메인
    pub const ALL: [DomainId; 3] = [DomainId::Ssh, DomainId::Web, DomainId::Database];

    /// 메트릭 레이블 등에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Web => "web",
            Self::Database => "database",
        }
    }

    /// 도메인의 인시던트 템플릿
    pub fn template(&self) -> IncidentTemplate {
        match self {
            Self::Ssh => IncidentTemplate::SSH_BRUTE_FORCE,
            Self::Web => IncidentTemplate::WEB_BRUTE_FORCE,
            Self::Database => IncidentTemplate::DATABASE_ABUSE,
        }
    }

    /// 도메인이 카운트하는 키의 종류
    pub fn key_kind(&self) -> KeyKind {
        match self {
            Self::Ssh | Self::Web => KeyKind::SourceIp,
            Self::Database => KeyKind::Username,
        }
    }

    fn describe(&self, key: &str) -> String {
        match self {
            Self::Ssh => format!("SSH brute force attack detected from {key}"),
            Self::Web => format!("Web application brute force attack from {key}"),
            Self::Database => format!("Suspicious database activity by user {key}"),
        }
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 분류기가 만든 도메인 이벤트
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    /// 속도 제한 키 (IP 또는 사용자명)
    pub key: String,
    /// 이벤트 시각
    pub timestamp: DateTime<Utc>,
    /// 원본 라인
    pub raw: String,
    /// 인시던트에 함께 실릴 필드 (예: `target_user`)
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DomainEvent {
    /// 새 이벤트를 만듭니다.
    pub fn new(key: impl Into<String>, timestamp: DateTime<Utc>, raw: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timestamp,
            raw: raw.into(),
            extra: BTreeMap::new(),
        }
    }

    /// 추가 필드를 기록합니다.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// 임계값 기반 탐지 도메인
#[derive(Debug)]
pub struct DetectionDomain {
    id: DomainId,
    evaluator: RuleEvaluator,
}

impl DetectionDomain {
    /// 평가기를 주입하여 도메인을 만듭니다.
    pub fn new(id: DomainId, evaluator: RuleEvaluator) -> Self {
        Self { id, evaluator }
    }

    /// 도메인 설정에서 도메인을 만듭니다.
    pub fn from_settings(id: DomainId, settings: &DomainSettings) -> Result<Self, DetectorError> {
        Ok(Self::new(id, RuleEvaluator::from_settings(settings)?))
    }

    /// 도메인 식별자
    pub fn id(&self) -> DomainId {
        self.id
    }

    /// 도메인이 만드는 인시던트의 종류
    pub fn kind(&self) -> DetectionKind {
        self.id.template().kind
    }

    /// 이벤트를 평가하고, 규칙이 발화하면 인시던트를 돌려줍니다.
    pub fn observe(&mut self, event: DomainEvent) -> Option<Incident> {
        let Evaluation {
            fired,
            attempt_count,
        } = self.evaluator.evaluate(&event.key, event.timestamp);

        debug!(
            domain = %self.id,
            key = %event.key,
            attempt_count,
            fired,
            "domain event evaluated"
        );

        if !fired {
            return None;
        }

        let window = self.evaluator.rule().window();
        let mut builder = IncidentBuilder::new(self.id.template(), event.timestamp)
            .source(self.id.key_kind(), event.key.as_str())
            .description(self.id.describe(&event.key))
            .attempts(attempt_count, window)
            .raw(&event.raw);
        if self.id == DomainId::Database {
            builder = builder.extra("query_count", attempt_count);
        }
        for (k, v) in event.extra {
            builder = builder.extra(k, v);
        }
        Some(builder.build())
    }

    /// 만료된 키를 정리합니다.
    ///
    /// 기준 시각은 `now - max(retention, window)`이므로 규칙 윈도우 안의
    /// 시각은 sweep으로 사라지지 않습니다. 삭제된 키 수를 반환합니다.
    pub fn sweep(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let keep_for = retention.max(self.evaluator.rule().window());
        let cutoff = window_start(now, TimeDelta::from_std(keep_for).unwrap_or(TimeDelta::MAX));
        self.evaluator.sweep(cutoff)
    }

    /// 추적 중인 키 수
    pub fn tracked_keys(&self) -> usize {
        self.evaluator.tracked_keys()
    }

    /// 내부 평가기
    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    /// 내부 평가기 (가변)
    pub fn evaluator_mut(&mut self) -> &mut RuleEvaluator {
        &mut self.evaluator
    }
}

/// 세 도메인의 묶음. 분석 루프가 소유합니다.
#[derive(Debug)]
pub struct DomainSet {
    ssh: DetectionDomain,
    web: DetectionDomain,
    database: DetectionDomain,
}

impl DomainSet {
    /// 도메인들을 주입하여 묶음을 만듭니다.
    pub fn new(ssh: DetectionDomain, web: DetectionDomain, database: DetectionDomain) -> Self {
        Self { ssh, web, database }
    }

    /// 탐지 엔진 설정에서 세 도메인을 만듭니다.
    pub fn from_config(config: &DetectorConfig) -> Result<Self, DetectorError> {
        Ok(Self::new(
            DetectionDomain::from_settings(DomainId::Ssh, &config.ssh)?,
            DetectionDomain::from_settings(DomainId::Web, &config.web)?,
            DetectionDomain::from_settings(DomainId::Database, &config.database)?,
        ))
    }

    /// 도메인을 가져옵니다.
    pub fn get(&self, id: DomainId) -> &DetectionDomain {
        match id {
            DomainId::Ssh => &self.ssh,
            DomainId::Web => &self.web,
            DomainId::Database => &self.database,
        }
    }

    /// 도메인을 가변으로 가져옵니다.
    pub fn get_mut(&mut self, id: DomainId) -> &mut DetectionDomain {
        match id {
            DomainId::Ssh => &mut self.ssh,
            DomainId::Web => &mut self.web,
            DomainId::Database => &mut self.database,
        }
    }

    /// 모든 도메인을 sweep합니다. 삭제된 키 수의 합을 반환합니다.
    pub fn sweep_all(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        DomainId::ALL
            .into_iter()
            .map(|id| self.get_mut(id).sweep(now, retention))
            .sum()
    }

    /// 도메인별 추적 키 수
    pub fn tracked_keys(&self) -> [(DomainId, usize); 3] {
        DomainId::ALL.map(|id| (id, self.get(id).tracked_keys()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn ssh_domain() -> DetectionDomain {
        DetectionDomain::from_settings(DomainId::Ssh, &DomainSettings::new(3, 60)).unwrap()
    }

    fn ssh_event(ip: &str, t: i64) -> DomainEvent {
        DomainEvent::new(
            ip,
            at(t),
            format!("Failed password for root from {ip} port 22 ssh2"),
        )
        .with_extra("target_user", "root")
    }

    #[test]
    fn ssh_incident_uses_template() {
        let mut domain = ssh_domain();
        assert!(domain.observe(ssh_event("10.0.0.5", 0)).is_none());
        assert!(domain.observe(ssh_event("10.0.0.5", 10)).is_none());
        let incident = domain.observe(ssh_event("10.0.0.5", 20)).unwrap();

        assert_eq!(incident.event_type, DetectionKind::SshBruteForce);
        assert_eq!(incident.attempt_count, Some(3));
        assert_eq!(incident.time_window.as_deref(), Some("60 seconds"));
        assert_eq!(incident.key_kind, Some(KeyKind::SourceIp));
        assert_eq!(incident.extra["target_user"], "root");
        assert_eq!(incident.extra["source_ip"], "10.0.0.5");
        assert!(incident.description.contains("10.0.0.5"));
        assert!(incident.incident_id.starts_with("SSH-BF-"));
    }

    #[test]
    fn database_incident_records_user_and_query_count() {
        let mut domain =
            DetectionDomain::from_settings(DomainId::Database, &DomainSettings::new(2, 300))
                .unwrap();
        domain.observe(DomainEvent::new("admin", at(0), "user: admin DROP TABLE x"));
        let incident = domain
            .observe(DomainEvent::new("admin", at(60), "user: admin DROP TABLE y"))
            .unwrap();
        assert_eq!(incident.key_kind, Some(KeyKind::Username));
        assert_eq!(incident.extra["source_user"], "admin");
        assert_eq!(incident.extra["query_count"], 2);
        assert_eq!(incident.description, "Suspicious database activity by user admin");
    }

    #[test]
    fn sweep_never_drops_entries_inside_rule_window() {
        let mut domain = ssh_domain();
        domain.observe(ssh_event("10.0.0.5", 0));
        // retention 10초 < window 60초 -> cutoff는 now-60
        let removed = domain.sweep(at(30), Duration::from_secs(10));
        assert_eq!(removed, 0);
        assert_eq!(domain.tracked_keys(), 1);
    }

    #[test]
    fn sweep_removes_idle_keys() {
        let mut domain = ssh_domain();
        domain.observe(ssh_event("10.0.0.5", 0));
        let removed = domain.sweep(at(7200), Duration::from_secs(3600));
        assert_eq!(removed, 1);
        assert_eq!(domain.tracked_keys(), 0);
    }

    #[test]
    fn domains_do_not_share_state() {
        let config = DetectorConfig {
            ssh: DomainSettings::new(2, 60),
            web: DomainSettings::new(2, 60),
            ..Default::default()
        };
        let mut set = DomainSet::from_config(&config).unwrap();
        set.get_mut(DomainId::Ssh)
            .observe(DomainEvent::new("1.2.3.4", at(0), "ssh"));
        let web = set
            .get_mut(DomainId::Web)
            .observe(DomainEvent::new("1.2.3.4", at(1), "web 401"));
        assert!(web.is_none());
        assert_eq!(set.get(DomainId::Ssh).tracked_keys(), 1);
        assert_eq!(set.get(DomainId::Web).tracked_keys(), 1);
    }

    #[test]
    fn sweep_all_covers_every_domain() {
        let mut set = DomainSet::from_config(&DetectorConfig::default()).unwrap();
        for id in DomainId::ALL {
            set.get_mut(id).observe(DomainEvent::new("k", at(0), "line"));
        }
        let removed = set.sweep_all(at(10_000), Duration::from_secs(3600));
        assert_eq!(removed, 3);
        assert!(set.tracked_keys().iter().all(|(_, n)| *n == 0));
    }
}

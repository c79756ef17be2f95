//! 탐지 시나리오 테스트 -- 도메인별 임계값, 윈도우, 리셋 동작 검증

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use logwarden_core::types::{DetectionKind, KeyKind, Severity};
use logwarden_detector::{
    DetectionDomain, DomainEvent, DomainId, DomainSettings, FirePolicy, RuleEvaluator,
    ThresholdRule,
};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn domain(id: DomainId, count: u32, window_secs: u64) -> DetectionDomain {
    DetectionDomain::from_settings(id, &DomainSettings::new(count, window_secs)).unwrap()
}

fn event(key: &str, secs: i64) -> DomainEvent {
    DomainEvent::new(key, at(secs), format!("raw line at {secs}"))
}

/// SSH: 60초 안에 3회 실패하면 세 번째에서 발화하고 카운터가 초기화됩니다.
#[test]
fn ssh_fires_on_third_attempt_then_resets() {
    let mut ssh = domain(DomainId::Ssh, 3, 60);

    assert!(ssh.observe(event("10.0.0.5", 0)).is_none());
    assert!(ssh.observe(event("10.0.0.5", 10)).is_none());
    let incident = ssh.observe(event("10.0.0.5", 20)).expect("third attempt fires");

    assert_eq!(incident.event_type, DetectionKind::SshBruteForce);
    assert_eq!(incident.severity, Severity::High);
    assert_eq!(incident.attempt_count, Some(3));
    assert_eq!(incident.source_key.as_deref(), Some("10.0.0.5"));
    assert_eq!(incident.key_kind, Some(KeyKind::SourceIp));
    assert_eq!(incident.time_window.as_deref(), Some("60 seconds"));
    assert_eq!(incident.raw_logs, "raw line at 20");

    // 리셋 이후 한 번은 발화하지 않음
    assert!(ssh.observe(event("10.0.0.5", 25)).is_none());
    assert!(ssh.observe(event("10.0.0.5", 26)).is_none());
    assert!(ssh.observe(event("10.0.0.5", 27)).is_some());
}

/// 웹: 윈도우 밖으로 밀려난 시도는 세지 않습니다.
#[test]
fn web_attempts_outside_window_do_not_fire() {
    let mut web = domain(DomainId::Web, 5, 120);

    for secs in [0, 10, 20, 30] {
        assert!(web.observe(event("203.0.113.9", secs)).is_none());
    }
    assert!(web.observe(event("203.0.113.9", 200)).is_none());
    assert_eq!(web.evaluator_mut().count_in_window("203.0.113.9", at(200)), 1);
}

/// DB: 사용자별 2회에 발화하고, 리셋 후에는 다시 2회가 필요합니다.
#[test]
fn database_fires_per_user_and_requires_refill() {
    let mut db = domain(DomainId::Database, 2, 300);

    assert!(db.observe(event("admin", 0)).is_none());
    let incident = db.observe(event("admin", 60)).expect("second query fires");
    assert_eq!(incident.event_type, DetectionKind::DatabaseAbuse);
    assert_eq!(incident.attempt_count, Some(2));
    assert_eq!(incident.key_kind, Some(KeyKind::Username));
    assert_eq!(incident.extra.get("query_count"), Some(&serde_json::json!(2)));

    assert!(db.observe(event("admin", 460)).is_none());
    assert!(db.observe(event("admin", 470)).is_some());
}

/// 키는 서로 독립적으로 집계됩니다.
#[test]
fn keys_are_counted_independently() {
    let mut ssh = domain(DomainId::Ssh, 3, 60);
    for secs in 0..2 {
        assert!(ssh.observe(event("10.0.0.1", secs)).is_none());
        assert!(ssh.observe(event("10.0.0.2", secs)).is_none());
    }
    assert!(ssh.observe(event("10.0.0.1", 5)).is_some());
    assert_eq!(ssh.evaluator_mut().count_in_window("10.0.0.2", at(5)), 2);
}

/// keep 정책에서는 윈도우 안의 매 이벤트가 발화합니다.
#[test]
fn keep_policy_fires_on_every_event_over_threshold() {
    let rule = ThresholdRule::new(2, Duration::from_secs(60)).unwrap();
    let mut ssh = DetectionDomain::new(DomainId::Ssh, RuleEvaluator::new(rule, FirePolicy::Keep));

    assert!(ssh.observe(event("10.0.0.5", 0)).is_none());
    assert_eq!(ssh.observe(event("10.0.0.5", 1)).unwrap().attempt_count, Some(2));
    assert_eq!(ssh.observe(event("10.0.0.5", 2)).unwrap().attempt_count, Some(3));
}

/// sweep은 규칙 윈도우 안의 기록을 지우지 않습니다.
#[test]
fn sweep_reclaims_idle_keys_only() {
    let mut ssh = domain(DomainId::Ssh, 3, 60);
    ssh.observe(event("idle", 0));
    ssh.observe(event("active", 3600));

    let removed = ssh.sweep(at(3650), Duration::from_secs(60));
    assert_eq!(removed, 1);
    assert_eq!(ssh.tracked_keys(), 1);
    assert_eq!(ssh.evaluator_mut().count_in_window("active", at(3650)), 1);
}

/// 인시던트 ID는 프로세스 안에서 중복되지 않습니다.
#[test]
fn incident_ids_are_unique() {
    let mut ssh = domain(DomainId::Ssh, 1, 60);
    let ids: HashSet<String> = (0..500)
        .filter_map(|i| ssh.observe(event(&format!("10.0.{}.{}", i / 256, i % 256), 0)))
        .map(|incident| incident.incident_id)
        .collect();
    assert_eq!(ids.len(), 500);
    assert!(ids.iter().all(|id| id.starts_with("SSH-BF-")));
}

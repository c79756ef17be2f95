//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 탐지 엔진과 데몬은 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::gauge!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logwarden_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logwarden_core::metrics::LINES_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 탐지 종류 레이블 키 (ssh_brute_force, sql_injection, ...)
pub const LABEL_KIND: &str = "kind";

/// 전달 대상 레이블 키 (store, webhook)
pub const LABEL_SINK: &str = "sink";

/// 탐지 도메인 레이블 키 (ssh, web, database)
pub const LABEL_DOMAIN: &str = "domain";

/// 로그 소스 레이블 키
pub const LABEL_SOURCE: &str = "source";

// ─── 분석 루프 메트릭 ──────────────────────────────────────────────

/// 분석된 로그 라인 수 (counter)
pub const LINES_PROCESSED_TOTAL: &str = "logwarden_lines_processed_total";

/// 생성된 인시던트 수 (counter, label: kind)
pub const INCIDENTS_TOTAL: &str = "logwarden_incidents_total";

/// 전달 실패 수 (counter, label: sink)
pub const SINK_FAILURES_TOTAL: &str = "logwarden_sink_failures_total";

/// 큐 포화로 버려진 인시던트 수 (counter)
pub const INCIDENTS_DROPPED_TOTAL: &str = "logwarden_incidents_dropped_total";

/// 도메인별 추적 중인 키 수 (gauge, label: domain)
pub const TRACKED_KEYS: &str = "logwarden_tracked_keys";

/// 소스 읽기 실패 수 (counter, label: source)
pub const SOURCE_ERRORS_TOTAL: &str = "logwarden_source_errors_total";

/// 분석 주기 소요 시간 (histogram, 초)
pub const CYCLE_DURATION_SECONDS: &str = "logwarden_cycle_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logwarden_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "logwarden_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 분석 주기 소요 시간 히스토그램 버킷 (초)
pub const CYCLE_DURATION_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `logwarden-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        LINES_PROCESSED_TOTAL,
        "Total number of log lines run through the detectors"
    );
    describe_counter!(
        INCIDENTS_TOTAL,
        "Total number of incidents raised, by detection kind"
    );
    describe_counter!(
        SINK_FAILURES_TOTAL,
        "Total number of failed incident deliveries, by sink"
    );
    describe_counter!(
        INCIDENTS_DROPPED_TOTAL,
        "Total number of incidents dropped due to delivery queue overflow"
    );
    describe_gauge!(
        TRACKED_KEYS,
        "Number of keys currently tracked by each sliding-window domain"
    );
    describe_counter!(
        SOURCE_ERRORS_TOTAL,
        "Total number of failed reads from log sources"
    );
    describe_histogram!(
        CYCLE_DURATION_SECONDS,
        "Time to complete a single analysis cycle in seconds"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Logwarden daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        LINES_PROCESSED_TOTAL,
        INCIDENTS_TOTAL,
        SINK_FAILURES_TOTAL,
        INCIDENTS_DROPPED_TOTAL,
        TRACKED_KEYS,
        SOURCE_ERRORS_TOTAL,
        CYCLE_DURATION_SECONDS,
        DAEMON_UPTIME_SECONDS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_logwarden_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("logwarden_"),
                "Metric '{}' does not start with 'logwarden_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            LINES_PROCESSED_TOTAL,
            INCIDENTS_TOTAL,
            SINK_FAILURES_TOTAL,
            INCIDENTS_DROPPED_TOTAL,
            SOURCE_ERRORS_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_KIND, LABEL_SINK, LABEL_DOMAIN, LABEL_SOURCE] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn cycle_duration_buckets_are_sorted() {
        let buckets = CYCLE_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(buckets[i] > buckets[i - 1]);
        }
    }
}

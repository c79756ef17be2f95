//! 분석 루프 -- 주기적으로 소스를 읽고 탐지 결과를 디스패처로 넘깁니다.
//!
//! # 상태
//! - `Idle`: 주기 사이 대기
//! - `Scanning`: 소스를 순서대로 읽는 중
//!
//! 한 주기(`run_cycle`)는 모든 소스를 끝까지 읽고, 레코드마다 분류기와 도메인을
//! 거쳐 인시던트를 만든 뒤, 마지막에 모든 도메인을 한 번 sweep합니다.
//! 주기 안에서는 소스를 동시에 읽지 않습니다.
//!
//! # 내부 아키텍처
//! ```text
//! Sources -> ClassifierSet -> DomainSet / Immediate -> IncidentDispatcher -> Emitter
//! ```

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logwarden_core::metrics as m;
use logwarden_core::types::Incident;

use crate::classifier::{ClassifierSet, Finding};
use crate::config::{DetectorConfig, SourceKind};
use crate::dispatcher::{DispatchStats, IncidentDispatcher};
use crate::domain::{DomainId, DomainSet};
use crate::emitter::IncidentEmitter;
use crate::error::DetectorError;
use crate::sink::{DynIncidentSink, JsonFileStore, WebhookNotifier};
use crate::source::{DynLogSource, open_source};

/// 분석 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// 주기 사이 대기
    Idle,
    /// 소스 스캔 중
    Scanning,
}

/// 한 주기의 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 처리한 레코드 수
    pub lines: usize,
    /// 생성된 인시던트 수
    pub incidents: usize,
    /// 읽기에 실패한 소스 수
    pub source_errors: usize,
    /// sweep으로 삭제된 키 수
    pub swept_keys: usize,
}

/// 누적 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// 완료한 주기 수
    pub cycles: u64,
    /// 처리한 레코드 수
    pub lines: u64,
    /// 생성된 인시던트 수
    pub incidents: u64,
    /// 소스 읽기 실패 수
    pub source_errors: u64,
}

/// 분석 루프
///
/// # 사용 예시
/// ```ignore
/// let mut analysis = AnalysisLoopBuilder::new().config(config).build()?;
/// let shutdown = CancellationToken::new();
///
/// analysis.run(shutdown.clone()).await;
/// let delivered = analysis.shutdown().await;
/// ```
pub struct AnalysisLoop {
    interval: Duration,
    sweep_retention: Duration,
    state: LoopState,
    domains: DomainSet,
    classifiers: ClassifierSet,
    sources: Vec<Box<dyn DynLogSource>>,
    dispatcher: IncidentDispatcher,
    /// 웹훅이 설정되어 있으면 모든 인시던트에 `webhook_destination`으로 기록
    webhook_destination: Option<String>,
    stats: LoopStats,
}

impl AnalysisLoop {
    /// 현재 상태
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// 누적 통계
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// 도메인별 추적 키 수
    pub fn tracked_keys(&self) -> [(DomainId, usize); 3] {
        self.domains.tracked_keys()
    }

    /// 탐지 도메인
    pub fn domains(&self) -> &DomainSet {
        &self.domains
    }

    /// 등록된 소스 수
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// 인시던트 디스패처
    pub fn dispatcher(&self) -> &IncidentDispatcher {
        &self.dispatcher
    }

    /// 레코드 하나를 분류하고 평가합니다.
    ///
    /// 분류 결과를 순서대로 처리하다가 처음 생긴 인시던트를 돌려줍니다.
    /// 디스패처로 넘기지는 않습니다.
    pub fn process_record(
        &mut self,
        kind: SourceKind,
        text: &str,
        log_source: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<Incident> {
        for finding in self.classifiers.classify(kind, text, timestamp) {
            let produced = match finding {
                Finding::Rate { domain, event } => self.domains.get_mut(domain).observe(event),
                Finding::Immediate(builder) => Some(builder.build()),
            };
            if let Some(mut incident) = produced {
                incident.log_source = log_source.to_owned();
                if let Some(url) = &self.webhook_destination {
                    incident
                        .extra
                        .insert("webhook_destination".to_owned(), url.clone().into());
                }
                return Some(incident);
            }
        }
        None
    }

    /// 스캔 한 주기를 수행합니다.
    ///
    /// 소스 읽기 실패는 해당 소스만 건너뛰고 보고서에 집계합니다.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        self.state = LoopState::Scanning;
        let mut report = CycleReport::default();

        for idx in 0..self.sources.len() {
            let read = self.sources[idx].read_new().await;
            let source = &self.sources[idx];
            let name = source.name().to_owned();
            let records = match read {
                Ok(records) => records,
                Err(e) => {
                    report.source_errors += 1;
                    counter!(m::SOURCE_ERRORS_TOTAL, m::LABEL_SOURCE => name.clone()).increment(1);
                    warn!(source = %name, error = %e, "source read failed, skipping this cycle");
                    continue;
                }
            };
            let kind = source.kind();
            let label = source.label().to_owned();

            counter!(m::LINES_PROCESSED_TOTAL, m::LABEL_SOURCE => name.clone())
                .increment(records.len() as u64);
            report.lines += records.len();

            for record in records {
                let Some(incident) = self.process_record(kind, &record, &label, Utc::now()) else {
                    continue;
                };
                report.incidents += 1;
                counter!(m::INCIDENTS_TOTAL, m::LABEL_KIND => incident.event_type.as_str())
                    .increment(1);
                info!(
                    incident_id = %incident.incident_id,
                    kind = incident.event_type.as_str(),
                    severity = incident.severity.as_label(),
                    source_key = incident.source_key.as_deref().unwrap_or("-"),
                    source = %name,
                    "incident detected"
                );
                self.dispatcher.submit(incident);
            }
        }

        report.swept_keys = self.domains.sweep_all(Utc::now(), self.sweep_retention);
        for (domain, keys) in self.domains.tracked_keys() {
            gauge!(m::TRACKED_KEYS, m::LABEL_DOMAIN => domain.as_str()).set(keys as f64);
        }
        histogram!(m::CYCLE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        self.stats.cycles += 1;
        self.stats.lines += report.lines as u64;
        self.stats.incidents += report.incidents as u64;
        self.stats.source_errors += report.source_errors as u64;
        self.state = LoopState::Idle;

        debug!(
            lines = report.lines,
            incidents = report.incidents,
            source_errors = report.source_errors,
            swept_keys = report.swept_keys,
            "analysis cycle finished"
        );
        report
    }

    /// 취소될 때까지 주기마다 `run_cycle`을 실행합니다.
    ///
    /// 진행 중인 주기는 끝까지 수행한 뒤 종료합니다.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            sources = self.sources.len(),
            "analysis loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        info!(
            cycles = self.stats.cycles,
            lines = self.stats.lines,
            incidents = self.stats.incidents,
            "analysis loop stopped"
        );
    }

    /// 디스패처를 정리합니다. 큐에 남은 인시던트를 모두 전달한 뒤 반환합니다.
    pub async fn shutdown(self) -> DispatchStats {
        self.dispatcher.shutdown().await
    }
}

/// 분석 루프 빌더
///
/// 설정에서 도메인, 분류기, 소스, 전달 경로를 조립합니다.
/// 테스트에서는 분류기, 소스, 이미터를 직접 주입할 수 있습니다.
pub struct AnalysisLoopBuilder {
    config: DetectorConfig,
    classifiers: Option<ClassifierSet>,
    extra_sources: Vec<Box<dyn DynLogSource>>,
    emitter: Option<IncidentEmitter>,
}

impl AnalysisLoopBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
            classifiers: None,
            extra_sources: Vec::new(),
            emitter: None,
        }
    }

    /// 탐지 엔진 설정을 지정합니다.
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// 분류기 모음을 교체합니다.
    pub fn classifiers(mut self, classifiers: ClassifierSet) -> Self {
        self.classifiers = Some(classifiers);
        self
    }

    /// 설정 외의 소스를 추가합니다.
    pub fn source(mut self, source: Box<dyn DynLogSource>) -> Self {
        self.extra_sources.push(source);
        self
    }

    /// 이미터를 지정합니다. 지정하지 않으면 설정의 저장소와 웹훅으로 만듭니다.
    pub fn emitter(mut self, emitter: IncidentEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// 분석 루프를 빌드합니다. 디스패처 태스크를 시작하므로 tokio 런타임이 필요합니다.
    pub fn build(self) -> Result<AnalysisLoop, DetectorError> {
        self.config.validate()?;

        let domains = DomainSet::from_config(&self.config)?;
        let classifiers = match self.classifiers {
            Some(classifiers) => classifiers,
            None => ClassifierSet::new()?,
        };

        let mut sources: Vec<Box<dyn DynLogSource>> = self
            .config
            .sources
            .iter()
            .map(|spec| open_source(spec, self.config.start_at_end))
            .collect();
        sources.extend(self.extra_sources);

        let emitter = match self.emitter {
            Some(emitter) => emitter,
            None => default_emitter(&self.config)?,
        };
        let dispatcher = IncidentDispatcher::spawn(
            emitter,
            self.config.queue_capacity,
            self.config.drop_policy,
        );

        Ok(AnalysisLoop {
            interval: self.config.interval,
            sweep_retention: self.config.sweep_retention,
            state: LoopState::Idle,
            domains,
            classifiers,
            sources,
            dispatcher,
            webhook_destination: self.config.webhook_url.clone(),
            stats: LoopStats::default(),
        })
    }
}

impl Default for AnalysisLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_emitter(config: &DetectorConfig) -> Result<IncidentEmitter, DetectorError> {
    let store: Box<dyn DynIncidentSink> = Box::new(JsonFileStore::new(&config.store_path));
    let notifier: Option<Box<dyn DynIncidentSink>> = match &config.webhook_url {
        Some(url) => Some(Box::new(WebhookNotifier::new(
            url.as_str(),
            config.webhook_timeout,
        )?)),
        None => None,
    };
    Ok(IncidentEmitter::new(store, notifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectorConfigBuilder, DomainSettings};
    use logwarden_core::types::DetectionKind;

    fn test_loop(dir: &std::path::Path) -> AnalysisLoop {
        let config = DetectorConfigBuilder::new()
            .store_path(dir.join("store.json"))
            .ssh(DomainSettings::new(3, 60))
            .build()
            .unwrap();
        AnalysisLoopBuilder::new().config(config).build().unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn third_ssh_failure_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut analysis = test_loop(dir.path());
        let line = "Failed password for root from 192.168.1.100 port 22 ssh2";

        assert!(analysis.process_record(SourceKind::Ssh, line, "ssh.log", at(0)).is_none());
        assert!(analysis.process_record(SourceKind::Ssh, line, "ssh.log", at(10)).is_none());
        let incident = analysis
            .process_record(SourceKind::Ssh, line, "ssh.log", at(20))
            .unwrap();
        assert_eq!(incident.event_type, DetectionKind::SshBruteForce);
        assert_eq!(incident.log_source, "ssh.log");
        assert_eq!(incident.attempt_count, Some(3));
    }

    #[tokio::test]
    async fn web_sqli_is_checked_when_brute_force_does_not_fire() {
        let dir = tempfile::tempdir().unwrap();
        let mut analysis = test_loop(dir.path());
        let line = r#"10.0.0.9 - - "GET /login?id=1' OR '1'='1 HTTP/1.1" 403 120"#;

        let incident = analysis
            .process_record(SourceKind::Web, line, "web.log", at(0))
            .unwrap();
        assert_eq!(incident.event_type, DetectionKind::SqlInjection);
    }

    #[tokio::test]
    async fn incidents_carry_webhook_destination_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfigBuilder::new()
            .store_path(dir.path().join("store.json"))
            .webhook_url("http://127.0.0.1:5678/webhook/log-analysis")
            .build()
            .unwrap();
        let mut analysis = AnalysisLoopBuilder::new().config(config).build().unwrap();

        let incident = analysis
            .process_record(SourceKind::Web, "GET /?q=<script>alert(1)</script>", "web.log", at(0))
            .unwrap();
        assert_eq!(
            incident.extra["webhook_destination"],
            "http://127.0.0.1:5678/webhook/log-analysis"
        );
    }

    #[tokio::test]
    async fn incidents_omit_webhook_destination_without_webhook() {
        let dir = tempfile::tempdir().unwrap();
        let mut analysis = test_loop(dir.path());
        let incident = analysis
            .process_record(SourceKind::Application, "ERROR db pool exhausted", "application.log", at(0))
            .unwrap();
        assert!(!incident.extra.contains_key("webhook_destination"));
    }

    #[tokio::test]
    async fn unmatched_line_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut analysis = test_loop(dir.path());
        assert!(
            analysis
                .process_record(SourceKind::Ssh, "Accepted publickey for ops", "ssh.log", at(0))
                .is_none()
        );
        assert_eq!(analysis.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn empty_cycle_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut analysis = test_loop(dir.path());
        let report = analysis.run_cycle().await;
        assert_eq!(report, CycleReport::default());
        assert_eq!(analysis.stats().cycles, 1);
        analysis.shutdown().await;
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let mut analysis = test_loop(dir.path());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        analysis.run(shutdown).await;
        assert_eq!(analysis.state(), LoopState::Idle);
    }
}

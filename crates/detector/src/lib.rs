#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`window`]: 키별 슬라이딩 윈도우 카운터
//! - [`rule`]: 임계값 규칙과 평가기 (발화 시 리셋 정책)
//! - [`domain`]: SSH/웹/DB 탐지 도메인과 인시던트 생성
//! - [`classifier`]: 소스 종류별 로그 분류기 (SQLi, XSS, 피싱 포함)
//! - [`incident`]: 인시던트 ID, 템플릿, 빌더
//! - [`source`]: 파일 tail, 메일 디렉토리 소스
//! - [`sink`]: JSON 파일 저장소, 웹훅 알림
//! - [`emitter`]: 저장소/알림기 독립 전달
//! - [`queue`], [`dispatcher`]: 용량 제한 전달 큐와 백그라운드 전달 태스크
//! - [`analysis`]: 주기적 분석 루프
//! - [`config`]: 탐지 엔진 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Sources -> ClassifierSet -> DomainSet -> IncidentDispatcher -> IncidentEmitter
//!    |            |              |                |                  |
//! File/Mail   Rate/Immediate  Sliding window   Bounded queue    Store + Webhook
//! ```

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod emitter;
pub mod error;
pub mod incident;
pub mod queue;
pub mod rule;
pub mod sink;
pub mod source;
pub mod window;

// --- 주요 타입 re-export ---

// 분석 루프
pub use analysis::{AnalysisLoop, AnalysisLoopBuilder, CycleReport, LoopState, LoopStats};

// 설정
pub use config::{
    DetectorConfig, DetectorConfigBuilder, DomainSettings, DropPolicy, FirePolicy, SourceKind,
    SourceSpec,
};

// 에러
pub use error::DetectorError;

// 탐지
pub use classifier::{Classifier, ClassifierSet, Finding};
pub use domain::{DetectionDomain, DomainEvent, DomainId, DomainSet};
pub use rule::{Evaluation, RuleEvaluator, ThresholdRule};
pub use window::SlidingWindowCounter;

// 인시던트
pub use incident::{IncidentBuilder, IncidentTemplate};

// 전달
pub use dispatcher::{DispatchStats, IncidentDispatcher};
pub use emitter::{EmitOutcome, IncidentEmitter};
pub use queue::IncidentQueue;
pub use sink::{DynIncidentSink, IncidentSink, JsonFileStore, WebhookNotifier};

// 소스
pub use source::{DynLogSource, FileTailSource, LogSource, MailDirSource};

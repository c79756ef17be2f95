//! 로그 분류기 -- 원본 텍스트를 탐지 후보로 변환
//!
//! 분류기는 상태가 없는 순수 함수입니다. 한 줄(이메일이면 메시지 전체)을 받아
//! 우선순위 순서의 [`Finding`] 목록을 돌려줍니다.
//!
//! - [`Finding::Rate`]: 임계값 도메인으로 보낼 이벤트
//! - [`Finding::Immediate`]: 즉시 인시던트가 되는 단발성 탐지 (SQLi, XSS 등)
//!
//! 분석 루프는 목록을 앞에서부터 처리하다가 인시던트가 하나 생기면 멈춥니다.
//! 웹 로그에서 무차별 대입 이벤트가 발화하지 않으면 SQLi, XSS 검사가 이어지는
//! 것은 이 규칙 때문입니다.
//!
//! # 구현체
//! - [`SshClassifier`]: `Failed password` 라인
//! - [`WebClassifier`]: 401/403 응답, SQL 인젝션, XSS
//! - [`DatabaseClassifier`]: 의심 쿼리 패턴
//! - [`ApplicationClassifier`]: error/failed 라인
//! - [`PhishingClassifier`]: 이메일 피싱 점수

pub mod application;
pub mod database;
pub mod phishing;
pub mod ssh;
pub mod web;

pub use application::ApplicationClassifier;
pub use database::DatabaseClassifier;
pub use phishing::{PhishingAnalysis, PhishingClassifier, PhishingVerdict};
pub use ssh::SshClassifier;
pub use web::WebClassifier;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::SourceKind;
use crate::domain::{DomainEvent, DomainId};
use crate::error::DetectorError;
use crate::incident::IncidentBuilder;

/// 분류 결과 하나
#[derive(Debug, Clone)]
pub enum Finding {
    /// 임계값 도메인으로 보낼 이벤트
    Rate {
        /// 대상 도메인
        domain: DomainId,
        /// 이벤트
        event: DomainEvent,
    },
    /// 즉시 발행할 인시던트
    Immediate(IncidentBuilder),
}

/// 로그 분류기 trait
///
/// 새로운 소스 종류를 지원하려면 이 trait을 구현합니다.
/// 형식이 맞지 않는 입력은 에러가 아니라 빈 목록입니다.
pub trait Classifier: Send + Sync {
    /// 분류기 이름
    fn name(&self) -> &str;

    /// 텍스트를 분류합니다.
    fn classify(&self, text: &str, timestamp: DateTime<Utc>) -> Vec<Finding>;
}

/// 소스 종류별 분류기 모음
pub struct ClassifierSet {
    classifiers: HashMap<SourceKind, Box<dyn Classifier>>,
}

impl ClassifierSet {
    /// 기본 분류기들로 모음을 만듭니다.
    pub fn new() -> Result<Self, DetectorError> {
        let mut classifiers: HashMap<SourceKind, Box<dyn Classifier>> = HashMap::new();
        classifiers.insert(SourceKind::Ssh, Box::new(SshClassifier::new()?));
        classifiers.insert(SourceKind::Web, Box::new(WebClassifier::new()?));
        classifiers.insert(SourceKind::Database, Box::new(DatabaseClassifier::new()?));
        classifiers.insert(SourceKind::Application, Box::new(ApplicationClassifier::new()));
        classifiers.insert(SourceKind::Email, Box::new(PhishingClassifier::new()?));
        Ok(Self { classifiers })
    }

    /// 소스 종류의 분류기를 교체합니다.
    pub fn register(&mut self, kind: SourceKind, classifier: Box<dyn Classifier>) {
        self.classifiers.insert(kind, classifier);
    }

    /// 소스 종류에 맞는 분류기로 텍스트를 분류합니다.
    pub fn classify(&self, kind: SourceKind, text: &str, timestamp: DateTime<Utc>) -> Vec<Finding> {
        self.classifiers
            .get(&kind)
            .map(|c| c.classify(text, timestamp))
            .unwrap_or_default()
    }
}

/// 대소문자를 무시하는 정규식 목록을 컴파일합니다.
pub(crate) fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>, DetectorError> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).map_err(DetectorError::from))
        .collect()
}

/// IPv4 주소 패턴
pub(crate) const IPV4_PATTERN: &str = r"(\d+\.\d+\.\d+\.\d+)";

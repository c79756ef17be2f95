//! 애플리케이션 로그 분류기

use chrono::{DateTime, Utc};

use super::{Classifier, Finding};
use crate::incident::{IncidentBuilder, IncidentTemplate};

/// 설명에 담을 라인의 최대 문자 수
const DESCRIPTION_MAX_CHARS: usize = 100;

/// `error` 또는 `failed`를 포함한 라인을 LOW 인시던트로 분류합니다.
#[derive(Debug, Default)]
pub struct ApplicationClassifier;

impl ApplicationClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl Classifier for ApplicationClassifier {
    fn name(&self) -> &str {
        "application"
    }

    fn classify(&self, text: &str, timestamp: DateTime<Utc>) -> Vec<Finding> {
        let lower = text.to_lowercase();
        if !(lower.contains("error") || lower.contains("failed")) {
            return Vec::new();
        }
        let summary: String = text.trim().chars().take(DESCRIPTION_MAX_CHARS).collect();
        vec![Finding::Immediate(
            IncidentBuilder::new(IncidentTemplate::APPLICATION_ERROR, timestamp)
                .description(format!("Application error detected: {summary}"))
                .raw(text),
        )]
    }
}

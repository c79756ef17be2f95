//! 데이터베이스 쿼리 로그 분류기

use chrono::{DateTime, Utc};
use regex::Regex;

use super::{Classifier, Finding, compile_all};
use crate::domain::{DomainEvent, DomainId};
use crate::error::DetectorError;

const SUSPICIOUS_QUERY_PATTERNS: &[&str] = &[
    r"SELECT \* FROM users",
    r"DROP TABLE",
    r"UPDATE.*SET.*password",
    r"DELETE FROM.*where.*1=1",
];

const UNKNOWN_USER: &str = "Unknown";

/// 의심 쿼리를 사용자명 키의 DB 도메인 이벤트로 분류합니다.
///
/// 한 라인이 여러 패턴에 걸려도 이벤트는 하나만 만듭니다.
pub struct DatabaseClassifier {
    suspicious: Vec<Regex>,
    user: Regex,
}

impl DatabaseClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new() -> Result<Self, DetectorError> {
        Ok(Self {
            suspicious: compile_all(SUSPICIOUS_QUERY_PATTERNS)?,
            user: Regex::new(r"user[:\s]*(\w+)")?,
        })
    }
}

impl Classifier for DatabaseClassifier {
    fn name(&self) -> &str {
        "database"
    }

    fn classify(&self, text: &str, timestamp: DateTime<Utc>) -> Vec<Finding> {
        if !self.suspicious.iter().any(|re| re.is_match(text)) {
            return Vec::new();
        }
        let user = self
            .user
            .captures(text)
            .and_then(|c| c.get(1))
            .map_or(UNKNOWN_USER, |m| m.as_str());
        vec![Finding::Rate {
            domain: DomainId::Database,
            event: DomainEvent::new(user, timestamp, text),
        }]
    }
}

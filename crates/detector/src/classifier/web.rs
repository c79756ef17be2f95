//! 웹 접근 로그 분류기
//!
//! 한 라인에서 다음 순서로 후보를 만듭니다.
//! 1. 401/403 응답 + IP -> 웹 무차별 대입 도메인 이벤트
//! 2. SQL 인젝션 패턴 -> 즉시 인시던트
//! 3. XSS 패턴 -> 즉시 인시던트 (SQL 인젝션이 없을 때만)

use chrono::{DateTime, Utc};
use regex::Regex;

use logwarden_core::types::KeyKind;

use super::{Classifier, Finding, IPV4_PATTERN, compile_all};
use crate::domain::{DomainEvent, DomainId};
use crate::error::DetectorError;
use crate::incident::{IncidentBuilder, IncidentTemplate};

const SQL_INJECTION_PATTERNS: &[&str] = &[
    r"'.*OR.*'1'='1",
    r"UNION.*SELECT",
    r"DROP.*TABLE",
    r"INSERT.*INTO",
    r"1';.*--",
];

const XSS_PATTERNS: &[&str] = &[r"<script>", r"javascript:", r"onload=", r"alert\("];

const UNKNOWN_SOURCE: &str = "Unknown";

/// 웹 접근 로그 분류기
pub struct WebClassifier {
    ip: Regex,
    sql_injection: Vec<Regex>,
    xss: Vec<Regex>,
}

impl WebClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new() -> Result<Self, DetectorError> {
        Ok(Self {
            ip: Regex::new(IPV4_PATTERN)?,
            sql_injection: compile_all(SQL_INJECTION_PATTERNS)?,
            xss: compile_all(XSS_PATTERNS)?,
        })
    }

    fn source_ip<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.ip
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    fn immediate(
        template: IncidentTemplate,
        description: String,
        ip: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Finding {
        Finding::Immediate(
            IncidentBuilder::new(template, timestamp)
                .source(KeyKind::SourceIp, ip)
                .description(description)
                .raw(text),
        )
    }
}

impl Classifier for WebClassifier {
    fn name(&self) -> &str {
        "web"
    }

    fn classify(&self, text: &str, timestamp: DateTime<Utc>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let ip = self.source_ip(text);

        if text.contains("401") || text.contains("403") {
            if let Some(ip) = ip {
                findings.push(Finding::Rate {
                    domain: DomainId::Web,
                    event: DomainEvent::new(ip, timestamp, text),
                });
            }
        }

        let ip = ip.unwrap_or(UNKNOWN_SOURCE);
        if self.sql_injection.iter().any(|re| re.is_match(text)) {
            findings.push(Self::immediate(
                IncidentTemplate::SQL_INJECTION,
                format!("SQL injection attempt detected from {ip}"),
                ip,
                text,
                timestamp,
            ));
        } else if self.xss.iter().any(|re| re.is_match(text)) {
            findings.push(Self::immediate(
                IncidentTemplate::XSS,
                format!("Cross-site scripting attempt from {ip}"),
                ip,
                text,
                timestamp,
            ));
        }

        findings
    }
}

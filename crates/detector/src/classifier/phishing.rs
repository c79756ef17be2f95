//! 이메일 피싱 분류기
//!
//! 메시지 하나를 네 가지 범주로 채점하고 가장 높은 점수를 전체 점수로 씁니다.
//!
//! | 범주 | 기준 | 점수 |
//! |---|---|---|
//! | 도메인 | 발신 도메인이 악성 목록에 있음 | 9 |
//! | 본문 | 피싱 문구 가중치 합 | 최대 10 |
//! | 헤더 | 발신자에 `noreply` 포함 | 3 |
//! | 첨부 | `.exe/.scr/.bat/.cmd` 10, `.zip` 6 | |
//!
//! 전체 점수 6 이상은 피싱(HIGH), 4 이상은 의심(MEDIUM)입니다.
//! 헤더는 `From:`, `Subject:`, `filename=` 라인만 읽으며 MIME 디코딩은 하지 않습니다.

use std::fmt;

use chrono::{DateTime, Utc};
use regex::Regex;

use logwarden_core::types::{KeyKind, Severity};

use super::{Classifier, Finding};
use crate::error::DetectorError;
use crate::incident::{IncidentBuilder, IncidentTemplate};

const MALICIOUS_DOMAINS: &[&str] = &[
    "paypal-security-verification.com",
    "paypal-secure-verification.com",
    "paypal-verification.net",
    "securemygateway.com",
    "account-security.com",
];

const CONTENT_INDICATORS: &[(&str, u32)] = &[
    ("urgent", 2),
    ("immediate action", 3),
    ("account suspension", 3),
    ("verify now", 2),
    ("security alert", 2),
    ("final warning", 3),
    ("account closure", 2),
    ("click here", 1),
    ("password reset", 2),
];

const EXECUTABLE_EXTENSIONS: &[&str] = &[".exe", ".scr", ".bat", ".cmd"];

const MAX_SCORE: u32 = 10;
const MALICIOUS_DOMAIN_SCORE: u32 = 9;
const NOREPLY_SCORE: u32 = 3;
const ARCHIVE_SCORE: u32 = 6;
const PHISHING_THRESHOLD: u32 = 6;
const SUSPICIOUS_THRESHOLD: u32 = 4;
/// 인시던트 `raw_logs`에 남길 메시지 앞부분 길이 (문자 수)
const RAW_HEAD_MAX_CHARS: usize = 500;

/// 피싱 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhishingVerdict {
    /// 점수 6 이상
    Phishing,
    /// 점수 4 이상
    Suspicious,
    /// 그 외
    Clean,
}

impl PhishingVerdict {
    /// 판정 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phishing => "phishing",
            Self::Suspicious => "suspicious",
            Self::Clean => "clean",
        }
    }
}

impl fmt::Display for PhishingVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 메시지 하나의 채점 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhishingAnalysis {
    /// `From:` 헤더 값
    pub sender: Option<String>,
    /// 발신 도메인
    pub sender_domain: Option<String>,
    /// `Subject:` 헤더 값
    pub subject: Option<String>,
    /// 첨부 파일 이름
    pub attachments: Vec<String>,
    /// 도메인 점수
    pub domain_score: u32,
    /// 본문 점수
    pub content_score: u32,
    /// 헤더 점수
    pub header_score: u32,
    /// 첨부 점수
    pub attachment_score: u32,
    /// 걸린 지표
    pub flags: Vec<String>,
}

impl PhishingAnalysis {
    /// 범주 점수 중 최댓값
    pub fn overall_score(&self) -> u32 {
        self.domain_score
            .max(self.content_score)
            .max(self.header_score)
            .max(self.attachment_score)
    }

    /// 전체 점수에 따른 판정
    pub fn verdict(&self) -> PhishingVerdict {
        match self.overall_score() {
            s if s >= PHISHING_THRESHOLD => PhishingVerdict::Phishing,
            s if s >= SUSPICIOUS_THRESHOLD => PhishingVerdict::Suspicious,
            _ => PhishingVerdict::Clean,
        }
    }
}

/// 이메일 피싱 분류기
pub struct PhishingClassifier {
    sender_domain: Regex,
    attachment_name: Regex,
}

impl PhishingClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new() -> Result<Self, DetectorError> {
        Ok(Self {
            sender_domain: Regex::new(r"@([\w.-]+)")?,
            attachment_name: Regex::new(r#"(?i)filename\*?=\s*"?([^";\r\n]+)"?"#)?,
        })
    }

    /// 메시지를 채점합니다.
    pub fn analyze(&self, message: &str) -> PhishingAnalysis {
        let (headers, body) = split_message(message);
        let mut analysis = PhishingAnalysis {
            sender: header_value(headers, "from"),
            subject: header_value(headers, "subject"),
            ..Default::default()
        };

        if let Some(sender) = &analysis.sender {
            analysis.sender_domain = self
                .sender_domain
                .captures(sender)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_lowercase());

            if sender.to_lowercase().contains("noreply") {
                analysis.header_score = NOREPLY_SCORE;
                analysis.flags.push("suspicious_sender".to_owned());
            }
        }

        if let Some(domain) = &analysis.sender_domain {
            if MALICIOUS_DOMAINS.contains(&domain.as_str()) {
                analysis.domain_score = MALICIOUS_DOMAIN_SCORE;
                analysis.flags.push("known_malicious_domain".to_owned());
            }
        }

        let content = format!(
            "{}\n{}",
            analysis.subject.as_deref().unwrap_or_default(),
            body
        )
        .to_lowercase();
        let mut content_score = 0;
        for (indicator, weight) in CONTENT_INDICATORS {
            if content.contains(indicator) {
                content_score += weight;
                analysis.flags.push((*indicator).to_owned());
            }
        }
        analysis.content_score = content_score.min(MAX_SCORE);

        analysis.attachments = self
            .attachment_name
            .captures_iter(message)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_owned())
            .collect();
        for name in &analysis.attachments {
            let lower = name.to_lowercase();
            if EXECUTABLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
                analysis.attachment_score = MAX_SCORE;
                analysis.flags.push("executable_attachment".to_owned());
            } else if lower.ends_with(".zip") {
                analysis.attachment_score = analysis.attachment_score.max(ARCHIVE_SCORE);
                analysis.flags.push("archive_attachment".to_owned());
            }
        }

        analysis
    }
}

impl Classifier for PhishingClassifier {
    fn name(&self) -> &str {
        "email"
    }

    fn classify(&self, text: &str, timestamp: DateTime<Utc>) -> Vec<Finding> {
        let analysis = self.analyze(text);
        let verdict = analysis.verdict();
        let (severity, action, label) = match verdict {
            PhishingVerdict::Phishing => (Severity::High, "quarantine_to_spam", "Phishing"),
            PhishingVerdict::Suspicious => (Severity::Medium, "flag_for_review", "Suspicious"),
            PhishingVerdict::Clean => return Vec::new(),
        };

        let score = analysis.overall_score();
        let head: String = text.chars().take(RAW_HEAD_MAX_CHARS).collect();
        let sender = analysis.sender.clone().unwrap_or_else(|| "Unknown".to_owned());
        let builder = IncidentBuilder::new(IncidentTemplate::PHISHING_EMAIL, timestamp)
            .source(KeyKind::Sender, sender.as_str())
            .severity(severity)
            .action(action)
            .confidence(f64::from(score) / f64::from(MAX_SCORE))
            .description(format!("{label} email from {sender} (score {score}/10)"))
            .raw(&head)
            .extra("phishing_score", score)
            .extra("verdict", verdict.as_str())
            .extra("flags", analysis.flags.clone())
            .extra("attachments", analysis.attachments.clone())
            .extra(
                "sender_domain",
                analysis
                    .sender_domain
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_owned()),
            );

        vec![Finding::Immediate(builder)]
    }
}

/// 첫 빈 줄을 기준으로 헤더와 본문을 나눕니다.
fn split_message(message: &str) -> (&str, &str) {
    for sep in ["\r\n\r\n", "\n\n"] {
        if let Some(idx) = message.find(sep) {
            return (&message[..idx], &message[idx + sep.len()..]);
        }
    }
    (message, "")
}

fn header_value(headers: &str, name: &str) -> Option<String> {
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_owned())
    })
}

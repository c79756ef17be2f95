//! SSH 인증 로그 분류기

use chrono::{DateTime, Utc};
use regex::Regex;

use super::{Classifier, Finding};
use crate::domain::{DomainEvent, DomainId};
use crate::error::DetectorError;

/// `Failed password for <user> from <ip>` 라인을 SSH 도메인 이벤트로 분류합니다.
pub struct SshClassifier {
    failed_password: Regex,
}

impl SshClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new() -> Result<Self, DetectorError> {
        Ok(Self {
            failed_password: Regex::new(r"Failed password for (\w+) from (\d+\.\d+\.\d+\.\d+)")?,
        })
    }
}

impl Classifier for SshClassifier {
    fn name(&self) -> &str {
        "ssh"
    }

    fn classify(&self, text: &str, timestamp: DateTime<Utc>) -> Vec<Finding> {
        let Some(caps) = self.failed_password.captures(text) else {
            return Vec::new();
        };
        let user = &caps[1];
        let ip = &caps[2];
        let event = DomainEvent::new(ip, timestamp, text).with_extra("target_user", user);
        vec![Finding::Rate {
            domain: DomainId::Ssh,
            event,
        }]
    }
}

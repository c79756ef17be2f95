//! 웹훅 알림 -- 인시던트 JSON을 HTTP POST로 전송
//!
//! 2xx 응답만 성공입니다. 그 외 상태 코드, 연결 실패, 타임아웃은 모두
//! [`DetectorError::Notify`]로 보고하며 재시도하지 않습니다.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use logwarden_core::types::Incident;

use super::IncidentSink;
use crate::error::DetectorError;

/// 웹훅 알림 sink
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// 요청마다 `timeout`이 적용되는 알림기를 만듭니다.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DetectorError> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DetectorError::Notify {
                target: url.clone(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, url })
    }

    /// 전송 대상 URL
    pub fn url(&self) -> &str {
        &self.url
    }

    fn notify_err(&self, reason: String) -> DetectorError {
        DetectorError::Notify {
            target: self.url.clone(),
            reason,
        }
    }
}

impl IncidentSink for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, incident: &Incident) -> Result<(), DetectorError> {
        let response = self
            .client
            .post(&self.url)
            .json(incident)
            .send()
            .await
            .map_err(|e| self.notify_err(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.notify_err(format!("webhook returned {status}")));
        }

        debug!(
            url = %self.url,
            incident_id = %incident.incident_id,
            status = status.as_u16(),
            "incident sent to webhook"
        );
        Ok(())
    }
}

//! 인시던트 이미터 -- 저장소와 알림기로 독립 전달
//!
//! 저장소를 먼저, 알림기를 다음에 시도합니다. 한쪽의 실패는 다른 쪽 시도를
//! 막지 않으며 호출자에게 에러로 전파되지 않습니다. 실패는 sink별로 로그와
//! 메트릭에 기록되고 [`EmitOutcome`]으로 보고됩니다. 재시도는 하지 않습니다.

use metrics::counter;
use tracing::{debug, warn};

use logwarden_core::metrics as m;
use logwarden_core::types::Incident;

use crate::sink::DynIncidentSink;

/// 전달 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOutcome {
    /// 저장소 기록 성공 여부
    pub store_ok: bool,
    /// 알림 성공 여부 (`None`이면 알림기 없음)
    pub notify_ok: Option<bool>,
}

impl EmitOutcome {
    /// 설정된 모든 sink에 전달되었는지 여부
    pub fn delivered(&self) -> bool {
        self.store_ok && self.notify_ok.unwrap_or(true)
    }
}

/// 인시던트 이미터
pub struct IncidentEmitter {
    store: Box<dyn DynIncidentSink>,
    notifier: Option<Box<dyn DynIncidentSink>>,
}

impl IncidentEmitter {
    /// 저장소와 선택적 알림기로 이미터를 만듭니다.
    pub fn new(
        store: Box<dyn DynIncidentSink>,
        notifier: Option<Box<dyn DynIncidentSink>>,
    ) -> Self {
        Self { store, notifier }
    }

    /// 인시던트를 전달합니다. 실패해도 에러를 반환하지 않습니다.
    pub async fn emit(&self, incident: &Incident) -> EmitOutcome {
        let store_ok = deliver_to(self.store.as_ref(), incident).await;
        let notify_ok = match &self.notifier {
            Some(notifier) => Some(deliver_to(notifier.as_ref(), incident).await),
            None => None,
        };

        let outcome = EmitOutcome {
            store_ok,
            notify_ok,
        };
        debug!(
            incident_id = %incident.incident_id,
            store_ok,
            ?notify_ok,
            delivered = outcome.delivered(),
            "incident emitted"
        );
        outcome
    }
}

async fn deliver_to(sink: &dyn DynIncidentSink, incident: &Incident) -> bool {
    match sink.deliver(incident).await {
        Ok(()) => true,
        Err(e) => {
            counter!(m::SINK_FAILURES_TOTAL, m::LABEL_SINK => sink.name().to_owned()).increment(1);
            warn!(
                sink = sink.name(),
                incident_id = %incident.incident_id,
                error = %e,
                "incident delivery failed"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectorError;
    use crate::incident::{IncidentBuilder, IncidentTemplate};
    use crate::sink::IncidentSink;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    /// 받은 인시던트 ID를 기록하고, 설정에 따라 실패하는 sink
    #[derive(Clone, Default)]
    struct RecordingSink {
        received: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl IncidentSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, incident: &Incident) -> Result<(), DetectorError> {
            if self.fail {
                return Err(DetectorError::Notify {
                    target: "test".to_owned(),
                    reason: "simulated".to_owned(),
                });
            }
            self.received
                .lock()
                .unwrap()
                .push(incident.incident_id.clone());
            Ok(())
        }
    }

    fn incident() -> Incident {
        IncidentBuilder::new(IncidentTemplate::SSH_BRUTE_FORCE, Utc::now()).build()
    }

    #[tokio::test]
    async fn both_sinks_succeed() {
        let store = RecordingSink::default();
        let notifier = RecordingSink::default();
        let emitter = IncidentEmitter::new(
            Box::new(store.clone()),
            Some(Box::new(notifier.clone())),
        );
        let outcome = emitter.emit(&incident()).await;
        assert!(outcome.delivered());
        assert_eq!(store.received.lock().unwrap().len(), 1);
        assert_eq!(notifier.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notifier_failure_keeps_stored_record() {
        let store = RecordingSink::default();
        let notifier = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let emitter = IncidentEmitter::new(Box::new(store.clone()), Some(Box::new(notifier)));
        let incident = incident();

        let outcome = emitter.emit(&incident).await;
        assert!(!outcome.delivered());
        assert!(outcome.store_ok);
        assert_eq!(outcome.notify_ok, Some(false));
        assert_eq!(*store.received.lock().unwrap(), vec![incident.incident_id]);
    }

    #[tokio::test]
    async fn store_failure_still_attempts_notifier() {
        let store = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let notifier = RecordingSink::default();
        let emitter = IncidentEmitter::new(Box::new(store), Some(Box::new(notifier.clone())));

        let outcome = emitter.emit(&incident()).await;
        assert!(!outcome.store_ok);
        assert_eq!(outcome.notify_ok, Some(true));
        assert_eq!(notifier.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn without_notifier_store_success_is_delivery() {
        let emitter = IncidentEmitter::new(Box::new(RecordingSink::default()), None);
        let outcome = emitter.emit(&incident()).await;
        assert!(outcome.delivered());
        assert_eq!(outcome.notify_ok, None);
    }
}

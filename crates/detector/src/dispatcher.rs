//! 인시던트 디스패처 -- 분석 루프와 전달을 분리하는 백그라운드 태스크
//!
//! 분석 루프는 [`IncidentDispatcher::submit`]으로 인시던트를 큐에 넣고 바로
//! 다음 라인으로 넘어갑니다. 전달 태스크가 큐를 비우며 [`IncidentEmitter`]를
//! 호출하므로, 느리거나 응답 없는 sink가 수집을 멈추지 않습니다.
//!
//! [`shutdown`](IncidentDispatcher::shutdown)은 큐에 남은 인시던트를 모두
//! 전달한 뒤 반환합니다.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use logwarden_core::types::Incident;

use crate::config::DropPolicy;
use crate::emitter::IncidentEmitter;
use crate::queue::IncidentQueue;

/// 디스패처 누적 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// 제출된 인시던트 수
    pub submitted: u64,
    /// 모든 sink에 전달된 수
    pub delivered: u64,
    /// 하나 이상의 sink가 실패한 수
    pub failed: u64,
    /// 큐 포화로 드롭된 수
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

struct Shared {
    queue: Mutex<IncidentQueue>,
    wake: Notify,
    closed: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, IncidentQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.queue().dropped_count(),
        }
    }
}

/// 용량 제한 큐 + 전달 태스크
pub struct IncidentDispatcher {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl IncidentDispatcher {
    /// 전달 태스크를 시작합니다. tokio 런타임 안에서 호출해야 합니다.
    pub fn spawn(emitter: IncidentEmitter, capacity: usize, drop_policy: DropPolicy) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(IncidentQueue::new(capacity, drop_policy)),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
        });
        let worker = tokio::spawn(run_worker(Arc::clone(&shared), emitter));
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// 인시던트를 큐에 넣습니다. 큐가 가득 차 드롭이 발생하면 `false`를 반환합니다.
    pub fn submit(&self, incident: Incident) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            warn!(
                incident_id = %incident.incident_id,
                "dispatcher is shut down, incident not queued"
            );
            return false;
        }
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let dropped = self.shared.queue().push(incident);
        self.shared.wake.notify_one();
        !dropped
    }

    /// 대기 중인 인시던트 수
    pub fn pending(&self) -> usize {
        self.shared.queue().len()
    }

    /// 현재 통계
    pub fn stats(&self) -> DispatchStats {
        self.shared.stats()
    }

    /// 남은 인시던트를 모두 전달하고 태스크를 종료합니다.
    pub async fn shutdown(mut self) -> DispatchStats {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.wake.notify_one();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "incident dispatcher task ended abnormally");
            }
        }
        let stats = self.shared.stats();
        info!(
            submitted = stats.submitted,
            delivered = stats.delivered,
            failed = stats.failed,
            dropped = stats.dropped,
            "incident dispatcher stopped"
        );
        stats
    }
}

impl Drop for IncidentDispatcher {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

async fn run_worker(shared: Arc<Shared>, emitter: IncidentEmitter) {
    loop {
        let next = shared.queue().pop();
        match next {
            Some(incident) => {
                let outcome = emitter.emit(&incident).await;
                let counter = if outcome.delivered() {
                    &shared.counters.delivered
                } else {
                    &shared.counters.failed
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                if shared.closed.load(Ordering::Acquire) {
                    break;
                }
                shared.wake.notified().await;
            }
        }
    }
}

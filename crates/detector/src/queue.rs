//! 인시던트 대기 큐 -- 용량 제한 인메모리 큐
//!
//! [`IncidentQueue`]는 분석 루프와 전달 태스크 사이에서 인시던트를 잠시
//! 보관합니다. 큐가 가득 찬 경우:
//! - [`DropPolicy::Oldest`](crate::config::DropPolicy::Oldest): 가장 오래된 인시던트를 드롭
//! - [`DropPolicy::Newest`](crate::config::DropPolicy::Newest): 새 인시던트를 거부

use std::collections::VecDeque;

use metrics::counter;

use logwarden_core::metrics as m;
use logwarden_core::types::Incident;

use crate::config::DropPolicy;

/// 용량 제한 인시던트 큐
pub struct IncidentQueue {
    queue: VecDeque<Incident>,
    capacity: usize,
    drop_policy: DropPolicy,
    /// 드롭된 인시던트 수
    dropped_count: u64,
    /// 총 유입 수
    total_received: u64,
}

impl IncidentQueue {
    /// 새 큐를 생성합니다.
    pub fn new(capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            drop_policy,
            dropped_count: 0,
            total_received: 0,
        }
    }

    /// 인시던트를 추가합니다. 드롭이 발생하면 `true`를 반환합니다.
    pub fn push(&mut self, incident: Incident) -> bool {
        self.total_received += 1;

        if self.queue.len() < self.capacity {
            self.queue.push_back(incident);
            return false;
        }

        self.dropped_count += 1;
        counter!(m::INCIDENTS_DROPPED_TOTAL).increment(1);
        match self.drop_policy {
            DropPolicy::Oldest => {
                if let Some(dropped) = self.queue.pop_front() {
                    tracing::warn!(
                        dropped = self.dropped_count,
                        capacity = self.capacity,
                        incident_id = %dropped.incident_id,
                        "incident queue full, dropped oldest incident"
                    );
                }
                self.queue.push_back(incident);
            }
            DropPolicy::Newest => {
                tracing::warn!(
                    dropped = self.dropped_count,
                    capacity = self.capacity,
                    incident_id = %incident.incident_id,
                    "incident queue full, rejected new incident"
                );
            }
        }
        true
    }

    /// 가장 오래된 인시던트를 꺼냅니다.
    pub fn pop(&mut self) -> Option<Incident> {
        self.queue.pop_front()
    }

    /// 남은 인시던트를 모두 꺼냅니다.
    pub fn drain_all(&mut self) -> Vec<Incident> {
        self.queue.drain(..).collect()
    }

    /// 대기 중인 인시던트 수
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// 큐가 비어있는지 여부
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 지금까지 드롭된 인시던트 수
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// 총 유입 수
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// 사용률 (0.0 ~ 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(u32::try_from(self.queue.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }
}

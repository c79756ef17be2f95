//! 슬라이딩 윈도우 카운터 -- 키별 최근 이벤트 시각 추적
//!
//! [`SlidingWindowCounter`]는 키(출발지 IP, 사용자명 등)마다 이벤트 시각을
//! 도착 순서대로 보관하고, 조회 시점 기준 윈도우 안의 이벤트 수를 셉니다.
//!
//! # 메모리 관리
//! - 조회([`count_in_window`](SlidingWindowCounter::count_in_window))할 때마다
//!   해당 키의 만료된 시각을 제거합니다.
//! - 조회되지 않는 유휴 키는 주기적인 [`sweep`](SlidingWindowCounter::sweep)이
//!   정리합니다. 시퀀스가 빈 키는 sweep에서 삭제됩니다.
//! - 조회만으로는 키가 생성되지 않습니다. 키는 `record`에서만 만들어집니다.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};

/// 키별 슬라이딩 윈도우 카운터
#[derive(Debug, Default)]
pub struct SlidingWindowCounter {
    /// 키 -> 도착 순서의 이벤트 시각
    entries: HashMap<String, VecDeque<DateTime<Utc>>>,
}

impl SlidingWindowCounter {
    /// 빈 카운터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 키에 이벤트 시각을 추가합니다.
    pub fn record(&mut self, key: &str, timestamp: DateTime<Utc>) {
        match self.entries.get_mut(key) {
            Some(seq) => seq.push_back(timestamp),
            None => {
                self.entries
                    .insert(key.to_owned(), VecDeque::from([timestamp]));
            }
        }
    }

    /// `now - window` 이하의 시각을 제거한 뒤 남은 이벤트 수를 반환합니다.
    ///
    /// 추적하지 않는 키는 0을 반환하며 새로 만들지 않습니다.
    pub fn count_in_window(&mut self, key: &str, now: DateTime<Utc>, window: TimeDelta) -> usize {
        let Some(seq) = self.entries.get_mut(key) else {
            return 0;
        };
        let cutoff = window_start(now, window);
        seq.retain(|t| *t > cutoff);
        seq.len()
    }

    /// 키의 시퀀스를 비웁니다. 키 자체는 다음 sweep까지 남습니다.
    pub fn reset(&mut self, key: &str) {
        if let Some(seq) = self.entries.get_mut(key) {
            seq.clear();
        }
    }

    /// 모든 키에서 `cutoff` 이하의 시각을 제거하고 빈 키를 삭제합니다.
    ///
    /// 삭제된 키 수를 반환합니다.
    pub fn sweep(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, seq| {
            seq.retain(|t| *t > cutoff);
            !seq.is_empty()
        });
        before - self.entries.len()
    }

    /// 추적 중인 키 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 추적 중인 키가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 키가 추적 중인지 확인합니다.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 키에 보관된 시각 수 (만료 여부와 무관)
    pub fn stored(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, VecDeque::len)
    }
}

/// `now - window`를 계산합니다. 범위를 벗어나면 표현 가능한 최소 시각을 씁니다.
pub(crate) fn window_start(now: DateTime<Utc>, window: TimeDelta) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

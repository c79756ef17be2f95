//! 임계값 규칙 평가
//!
//! [`RuleEvaluator`]는 도메인 하나의 [`ThresholdRule`]과 전용
//! [`SlidingWindowCounter`]를 소유합니다. 이벤트마다 기록 후 윈도우 내 개수를
//! 세고, 임계값 이상이면 발화(fire)합니다.
//!
//! 발화 후 처리는 [`FirePolicy`]를 따릅니다.
//! - `Reset`: 키의 카운터를 비워, 지속 공격은 임계값을 처음부터 다시 채워야 재발화
//! - `Keep`: 카운터를 유지하여 임계값 이상인 동안 매 이벤트마다 발화

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::{DomainSettings, FirePolicy};
use crate::error::DetectorError;
use crate::window::SlidingWindowCounter;

/// 임계값 규칙 (count, window). 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdRule {
    count: u32,
    window: Duration,
}

impl ThresholdRule {
    /// 새 규칙을 생성합니다. `count`와 `window`는 0보다 커야 합니다.
    pub fn new(count: u32, window: Duration) -> Result<Self, DetectorError> {
        if count == 0 {
            return Err(DetectorError::Config {
                field: "count".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if window.is_zero() {
            return Err(DetectorError::Config {
                field: "window".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(Self { count, window })
    }

    /// 발화에 필요한 최소 이벤트 수
    pub fn count(&self) -> u32 {
        self.count
    }

    /// 윈도우 길이
    pub fn window(&self) -> Duration {
        self.window
    }

    pub(crate) fn window_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.window).unwrap_or(TimeDelta::MAX)
    }
}

/// 단일 이벤트 평가 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// 규칙 발화 여부
    pub fired: bool,
    /// 윈도우 내 이벤트 수 (발화 시 리셋 이전 값)
    pub attempt_count: u32,
}

/// 도메인별 규칙 평가기
#[derive(Debug)]
pub struct RuleEvaluator {
    rule: ThresholdRule,
    policy: FirePolicy,
    counter: SlidingWindowCounter,
}

impl RuleEvaluator {
    /// 새 평가기를 생성합니다.
    pub fn new(rule: ThresholdRule, policy: FirePolicy) -> Self {
        Self {
            rule,
            policy,
            counter: SlidingWindowCounter::new(),
        }
    }

    /// 도메인 설정에서 평가기를 생성합니다.
    pub fn from_settings(settings: &DomainSettings) -> Result<Self, DetectorError> {
        let rule = ThresholdRule::new(settings.count, settings.window)?;
        Ok(Self::new(rule, settings.fire_policy))
    }

    /// 이벤트를 기록하고 규칙을 평가합니다.
    pub fn evaluate(&mut self, key: &str, timestamp: DateTime<Utc>) -> Evaluation {
        self.counter.record(key, timestamp);
        let count = self
            .counter
            .count_in_window(key, timestamp, self.rule.window_delta());
        let attempt_count = u32::try_from(count).unwrap_or(u32::MAX);
        let fired = attempt_count >= self.rule.count;

        if fired && self.policy == FirePolicy::Reset {
            self.counter.reset(key);
        }

        Evaluation {
            fired,
            attempt_count,
        }
    }

    /// 키의 현재 윈도우 내 이벤트 수를 반환합니다.
    pub fn count_in_window(&mut self, key: &str, now: DateTime<Utc>) -> usize {
        self.counter
            .count_in_window(key, now, self.rule.window_delta())
    }

    /// `cutoff` 이하의 시각을 정리하고 빈 키를 삭제합니다.
    pub fn sweep(&mut self, cutoff: DateTime<Utc>) -> usize {
        self.counter.sweep(cutoff)
    }

    /// 추적 중인 키 수
    pub fn tracked_keys(&self) -> usize {
        self.counter.len()
    }

    /// 평가 중인 규칙
    pub fn rule(&self) -> &ThresholdRule {
        &self.rule
    }

    /// 발화 정책
    pub fn policy(&self) -> FirePolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn evaluator(count: u32, window_secs: u64, policy: FirePolicy) -> RuleEvaluator {
        RuleEvaluator::new(
            ThresholdRule::new(count, Duration::from_secs(window_secs)).unwrap(),
            policy,
        )
    }

    #[test]
    fn rule_rejects_zero_count() {
        assert!(ThresholdRule::new(0, Duration::from_secs(60)).is_err());
    }

    #[test]
    fn rule_rejects_zero_window() {
        assert!(ThresholdRule::new(3, Duration::ZERO).is_err());
    }

    #[test]
    fn fires_on_nth_event_only() {
        let mut eval = evaluator(3, 60, FirePolicy::Reset);
        assert!(!eval.evaluate("k", at(0)).fired);
        assert!(!eval.evaluate("k", at(1)).fired);
        let third = eval.evaluate("k", at(2));
        assert!(third.fired);
        assert_eq!(third.attempt_count, 3);
    }

    #[test]
    fn reset_policy_zeroes_count_after_fire() {
        let mut eval = evaluator(2, 60, FirePolicy::Reset);
        eval.evaluate("k", at(0));
        assert!(eval.evaluate("k", at(1)).fired);
        assert_eq!(eval.count_in_window("k", at(1)), 0);
        assert!(!eval.evaluate("k", at(2)).fired);
    }

    #[test]
    fn keep_policy_fires_on_every_event_over_threshold() {
        let mut eval = evaluator(2, 60, FirePolicy::Keep);
        eval.evaluate("k", at(0));
        assert!(eval.evaluate("k", at(1)).fired);
        let next = eval.evaluate("k", at(2));
        assert!(next.fired);
        assert_eq!(next.attempt_count, 3);
    }

    #[test]
    fn single_event_rule_fires_every_time() {
        let mut eval = evaluator(1, 10, FirePolicy::Reset);
        assert!(eval.evaluate("k", at(0)).fired);
        assert!(eval.evaluate("k", at(0)).fired);
    }

    #[test]
    fn spread_out_events_never_fire() {
        let mut eval = evaluator(3, 60, FirePolicy::Reset);
        for t in [0, 40, 80, 120, 160] {
            assert!(!eval.evaluate("k", at(t)).fired, "t={t}");
        }
    }

    #[test]
    fn non_fired_evaluation_reports_count() {
        let mut eval = evaluator(5, 60, FirePolicy::Reset);
        eval.evaluate("k", at(0));
        let second = eval.evaluate("k", at(5));
        assert!(!second.fired);
        assert_eq!(second.attempt_count, 2);
    }

    #[test]
    fn from_settings_uses_policy() {
        let settings = DomainSettings {
            count: 2,
            window: Duration::from_secs(30),
            fire_policy: FirePolicy::Keep,
        };
        let eval = RuleEvaluator::from_settings(&settings).unwrap();
        assert_eq!(eval.policy(), FirePolicy::Keep);
        assert_eq!(eval.rule().count(), 2);
    }
}

//! Per-action attempt ledger

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// `(action kind, canonical params)`
pub type CooldownKey = (String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    pub last_attempt: Instant,
    pub consecutive: u32,
}

/// Limits repeated attempts of the same action.
///
/// A key is blocked once it has `max_attempts` consecutive attempts whose
/// most recent one is younger than the cooldown window. Times are passed in
/// explicitly so callers (and tests) control the clock.
#[derive(Debug)]
pub struct CooldownLedger {
    max_attempts: u32,
    cooldown: Duration,
    attempts: HashMap<CooldownKey, AttemptRecord>,
}

impl CooldownLedger {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts,
            cooldown,
            attempts: HashMap::new(),
        }
    }

    pub fn is_blocked(&self, key: &CooldownKey, now: Instant) -> bool {
        self.attempts.get(key).is_some_and(|rec| {
            rec.consecutive >= self.max_attempts
                && now.saturating_duration_since(rec.last_attempt) < self.cooldown
        })
    }

    /// Record an attempt. The streak continues inside the window and
    /// restarts at 1 outside it.
    pub fn record(&mut self, key: CooldownKey, now: Instant) {
        let cooldown = self.cooldown;
        self.attempts
            .entry(key)
            .and_modify(|rec| {
                rec.consecutive = if now.saturating_duration_since(rec.last_attempt) < cooldown {
                    rec.consecutive.saturating_add(1)
                } else {
                    1
                };
                rec.last_attempt = now;
            })
            .or_insert(AttemptRecord {
                last_attempt: now,
                consecutive: 1,
            });
    }

    pub fn get(&self, key: &CooldownKey) -> Option<&AttemptRecord> {
        self.attempts.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kind: &str) -> CooldownKey {
        (kind.to_string(), "{}".to_string())
    }

    #[test]
    fn blocks_after_max_attempts_inside_window() {
        let mut ledger = CooldownLedger::new(3, Duration::from_secs(300));
        let t0 = Instant::now();
        let k = key("restart_service");

        for i in 0..3 {
            assert!(!ledger.is_blocked(&k, t0 + Duration::from_secs(i * 10)));
            ledger.record(k.clone(), t0 + Duration::from_secs(i * 10));
        }
        assert!(ledger.is_blocked(&k, t0 + Duration::from_secs(60)));
        assert_eq!(ledger.get(&k).unwrap().consecutive, 3);
    }

    #[test]
    fn window_is_measured_from_last_attempt() {
        let mut ledger = CooldownLedger::new(3, Duration::from_secs(300));
        let t0 = Instant::now();
        let k = key("remount");
        for i in 0..3 {
            ledger.record(k.clone(), t0 + Duration::from_secs(i * 100));
        }
        // last attempt at t0+200
        assert!(ledger.is_blocked(&k, t0 + Duration::from_secs(499)));
        assert!(!ledger.is_blocked(&k, t0 + Duration::from_secs(500)));
    }

    #[test]
    fn attempt_after_window_resets_streak() {
        let mut ledger = CooldownLedger::new(3, Duration::from_secs(300));
        let t0 = Instant::now();
        let k = key("clear_cache");
        ledger.record(k.clone(), t0);
        ledger.record(k.clone(), t0 + Duration::from_secs(1));

        let later = t0 + Duration::from_secs(400);
        ledger.record(k.clone(), later);
        let rec = ledger.get(&k).unwrap();
        assert_eq!(rec.consecutive, 1);
        assert_eq!(rec.last_attempt, later);
    }

    #[test]
    fn keys_are_independent() {
        let mut ledger = CooldownLedger::new(1, Duration::from_secs(300));
        let t0 = Instant::now();
        ledger.record(key("a"), t0);
        assert!(ledger.is_blocked(&key("a"), t0));
        assert!(!ledger.is_blocked(&key("b"), t0));
    }
}

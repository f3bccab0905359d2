//! 准入闸门
//!
//! 每个请求按两个键限流，都限定在同一个频道作用域内:
//! 一个按收款地址，一个按请求人。任意一个键仍在冷却期内就拒绝，
//! 只有两个键都放行时才同时写入新的时间戳。
//!
//! 读写之间没有加锁，同一个键的并发请求在极端情况下可能被多放行一次。
//! 存储出错时一律放行 (fail-open)。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{KvStore, StoreError};

const ADDRESS_KEY_PREFIX: &str = "admission:addr:";
const AUTHOR_KEY_PREFIX: &str = "admission:author:";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动拨动的时钟，用于测试和回放
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = chrono::Duration::from_std(by)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 频道作用域: guild + channel
pub fn scope_id(guild_id: &str, channel_id: &str) -> String {
    format!("{}-{}", guild_id, channel_id)
}

pub fn address_key(scope: &str, address: &str) -> String {
    format!("{}{}-{}", ADDRESS_KEY_PREFIX, scope, address)
}

pub fn author_key(scope: &str, author: &str) -> String {
    format!("{}{}-{}", AUTHOR_KEY_PREFIX, scope, author)
}

/// 落盘的准入记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub key: String,
    pub admitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Blocked {
        retry_after: Duration,
        retry_at: DateTime<Utc>,
    },
}

impl Admission {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Admission::Blocked { .. })
    }

    pub fn retry_after(&self) -> Duration {
        match self {
            Admission::Admitted => Duration::ZERO,
            Admission::Blocked { retry_after, .. } => *retry_after,
        }
    }
}

#[derive(Clone)]
pub struct AdmissionGate {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl AdmissionGate {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn try_admit(
        &self,
        scope: &str,
        address: &str,
        requester: &str,
        cooldown: Duration,
    ) -> Admission {
        let now = self.clock.now();
        let keys = [address_key(scope, address), author_key(scope, requester)];
        let previous = keys.clone().map(|key| self.last_admitted(&key));

        // 两个键都在冷却期时取等待更久的那个
        let retry_after = previous
            .iter()
            .flatten()
            .map(|at| remaining(now, *at, cooldown))
            .max()
            .unwrap_or(Duration::ZERO);

        if !retry_after.is_zero() {
            let retry_at = chrono::Duration::from_std(retry_after)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            return Admission::Blocked {
                retry_after,
                retry_at,
            };
        }

        for (key, prev) in keys.into_iter().zip(previous) {
            // 时间戳只能往后走
            if prev.is_some_and(|at| at > now) {
                continue;
            }
            self.record(key, now);
        }
        Admission::Admitted
    }

    fn last_admitted(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.store.get(key.as_bytes()) {
            Ok(bytes) => match serde_json::from_slice::<AdmissionRecord>(&bytes) {
                Ok(record) => Some(record.admitted_at),
                Err(e) => {
                    tracing::warn!(key, error = %e, "corrupt admission record, treating as absent");
                    None
                }
            },
            Err(StoreError::NotFound) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "admission lookup failed, allowing request");
                None
            }
        }
    }

    fn record(&self, key: String, admitted_at: DateTime<Utc>) {
        let record = AdmissionRecord { key, admitted_at };
        let bytes = match serde_json::to_vec(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(key = %record.key, error = %e, "failed to encode admission record");
                return;
            }
        };
        if let Err(e) = self.store.set(record.key.as_bytes(), &bytes) {
            tracing::error!(key = %record.key, error = %e, "failed to persist admission record");
        }
    }
}

fn remaining(now: DateTime<Utc>, at: DateTime<Utc>, cooldown: Duration) -> Duration {
    // 记录在未来 (时钟回拨) 时按刚刚发生处理
    let elapsed = now.signed_duration_since(at).to_std().unwrap_or(Duration::ZERO);
    cooldown.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledStore;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn gate_at(dir: &TempDir, clock: Arc<ManualClock>) -> AdmissionGate {
        let store = SledStore::open(dir.path().join("faucet.db")).unwrap();
        AdmissionGate::new(Arc::new(store), clock)
    }

    struct FailingStore {
        fail_get: bool,
        fail_set: bool,
        inner: Mutex<std::collections::HashMap<Vec<u8>, Vec<u8>>>,
    }

    impl KvStore for FailingStore {
        fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
            if self.fail_get {
                return Err(StoreError::Io("disk on fire".into()));
            }
            self.inner
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
            if self.fail_set {
                return Err(StoreError::Io("read-only".into()));
            }
            self.inner.lock().unwrap().insert(key.to_vec(), value.to_vec());
            Ok(())
        }
    }

    #[test]
    fn same_address_is_blocked_with_shrinking_wait() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let gate = gate_at(&dir, clock.clone());

        assert_eq!(gate.try_admit("g-c", "stars1abc", "u1", HOUR), Admission::Admitted);

        clock.advance(Duration::from_secs(60));
        let first = gate.try_admit("g-c", "stars1abc", "u2", HOUR);
        assert!(first.is_blocked());
        assert_eq!(first.retry_after(), Duration::from_secs(59 * 60));

        clock.advance(Duration::from_secs(30 * 60));
        let second = gate.try_admit("g-c", "stars1abc", "u3", HOUR);
        assert!(second.retry_after() > Duration::ZERO);
        assert!(second.retry_after() < first.retry_after());
        match second {
            Admission::Blocked { retry_at, .. } => assert_eq!(retry_at, start() + chrono::Duration::hours(1)),
            Admission::Admitted => panic!("expected block"),
        }
    }

    #[test]
    fn author_id_equal_to_an_address_is_a_separate_key() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let gate = gate_at(&dir, clock);

        assert_ne!(address_key("g-c", "same"), author_key("g-c", "same"));
        assert!(!gate.try_admit("g-c", "same", "u1", HOUR).is_blocked());
        assert!(!gate.try_admit("g-c", "stars1other", "same", HOUR).is_blocked());
    }

    #[test]
    fn same_requester_different_address_is_blocked() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let gate = gate_at(&dir, clock.clone());

        assert!(!gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
        clock.advance(Duration::from_secs(1));
        assert!(gate.try_admit("g-c", "stars1xyz", "u1", HOUR).is_blocked());
    }

    #[test]
    fn scopes_are_independent() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let gate = gate_at(&dir, clock);

        assert!(!gate.try_admit("g-c1", "stars1abc", "u1", HOUR).is_blocked());
        assert!(!gate.try_admit("g-c2", "stars1abc", "u1", HOUR).is_blocked());
    }

    #[test]
    fn admitted_again_after_cooldown() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let gate = gate_at(&dir, clock.clone());

        assert!(!gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
        clock.advance(HOUR - Duration::from_secs(1));
        assert!(gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
        clock.advance(Duration::from_secs(2));
        assert!(!gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
    }

    #[test]
    fn longest_remaining_wait_wins() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let gate = gate_at(&dir, clock.clone());

        assert!(!gate.try_admit("g-c", "addr-a", "u1", HOUR).is_blocked());
        clock.advance(Duration::from_secs(30 * 60));
        assert!(!gate.try_admit("g-c", "addr-b", "u2", HOUR).is_blocked());
        clock.advance(Duration::from_secs(10 * 60));

        // addr-a 还剩 20 分钟，u2 还剩 50 分钟
        let blocked = gate.try_admit("g-c", "addr-a", "u2", HOUR);
        assert_eq!(blocked.retry_after(), Duration::from_secs(50 * 60));
    }

    #[test]
    fn blocked_attempt_does_not_refresh_timestamps() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let gate = gate_at(&dir, clock.clone());

        assert!(!gate.try_admit("g-c", "addr-a", "u1", HOUR).is_blocked());
        clock.advance(Duration::from_secs(50 * 60));
        // u9 未被记录
        assert!(gate.try_admit("g-c", "addr-a", "u9", HOUR).is_blocked());
        clock.advance(Duration::from_secs(11 * 60));
        assert!(!gate.try_admit("g-c", "addr-a", "u1", HOUR).is_blocked());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        {
            let gate = gate_at(&dir, clock.clone());
            assert!(!gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
        }
        clock.advance(Duration::from_secs(600));
        let gate = gate_at(&dir, clock);
        assert!(gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
    }

    #[test]
    fn timestamps_never_move_backwards() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start() + chrono::Duration::hours(10)));
        let gate = gate_at(&dir, clock.clone());

        assert!(!gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());

        // 时钟回拨，零冷却放行但不覆盖更晚的记录
        clock.set(start());
        assert!(!gate.try_admit("g-c", "stars1abc", "u1", Duration::ZERO).is_blocked());

        clock.set(start() + chrono::Duration::minutes(10 * 60 + 30));
        assert_eq!(
            gate.try_admit("g-c", "stars1abc", "u1", HOUR).retry_after(),
            Duration::from_secs(30 * 60)
        );
    }

    #[test]
    fn read_failure_fails_open() {
        let store = FailingStore {
            fail_get: true,
            fail_set: false,
            inner: Mutex::default(),
        };
        let gate = AdmissionGate::new(Arc::new(store), Arc::new(ManualClock::new(start())));

        assert!(!gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
        assert!(!gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
    }

    #[test]
    fn write_failure_still_admits() {
        let store = FailingStore {
            fail_get: false,
            fail_set: true,
            inner: Mutex::default(),
        };
        let gate = AdmissionGate::new(Arc::new(store), Arc::new(ManualClock::new(start())));

        assert_eq!(gate.try_admit("g-c", "stars1abc", "u1", HOUR), Admission::Admitted);
    }

    #[test]
    fn corrupt_record_is_ignored() {
        let store = Arc::new(FailingStore {
            fail_get: false,
            fail_set: false,
            inner: Mutex::default(),
        });
        store
            .set(address_key("g-c", "stars1abc").as_bytes(), b"\xffgarbage")
            .unwrap();
        let gate = AdmissionGate::new(store.clone(), Arc::new(ManualClock::new(start())));

        assert!(!gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
        // 已被正常记录覆盖
        assert!(gate.try_admit("g-c", "stars1abc", "u1", HOUR).is_blocked());
    }
}

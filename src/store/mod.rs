//! 持久化键值存储
//!
//! 只负责按字节读写，不理解时间戳等业务含义。每次 `set` 返回前都已经落盘。

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("store io error: {0}")]
    Io(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// 多个任务会并发调用，实现必须是线程安全的
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;
    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
}

/// 基于 sled 的实现，一个进程独占一个数据目录
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        Ok(Self { db })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self.db.get(key)? {
            Some(value) => Ok(value.to_vec()),
            None => Err(StoreError::NotFound),
        }
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key, value)?;
        // 同步刷盘
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path().join("faucet.db")).unwrap();

        for _ in 0..3 {
            assert!(matches!(store.get(b"nope"), Err(StoreError::NotFound)));
        }
    }

    #[test]
    fn set_then_get() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path().join("faucet.db")).unwrap();

        store.set(b"k", &[0, 1, 2, 255]).unwrap();
        assert_eq!(store.get(b"k").unwrap(), vec![0, 1, 2, 255]);

        store.set(b"k", b"v2").unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"v2".to_vec());
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faucet.db");
        {
            let store = SledStore::open(&path).unwrap();
            store.set(b"persist", b"yes").unwrap();
        }
        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.get(b"persist").unwrap(), b"yes".to_vec());
    }

    #[test]
    fn concurrent_writers() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path().join("faucet.db")).unwrap();

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.set(&[i], &[i; 8]).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for i in 0..4u8 {
            assert_eq!(store.get(&[i]).unwrap(), vec![i; 8]);
        }
    }
}

//! 链客户端边界
//!
//! 水龙头只关心两件事: 地址是否合法，以及把币发出去拿到交易哈希。
//! 签名、手续费、广播都由具体实现负责。

mod rest;

pub use rest::{RestLedgerClient, fee_for};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid coin: {0}")]
    Coin(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response {status}: {body}")]
    Http { status: u16, body: String },
    #[error("tx failed: {code}, log: {log}")]
    Broadcast {
        tx_hash: String,
        code: u32,
        log: String,
    },
}

impl LedgerError {
    /// 广播失败时交易哈希可能已经算出来了
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            LedgerError::Broadcast { tx_hash, .. } if !tx_hash.is_empty() => Some(tx_hash),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Network(e.to_string())
    }
}

/// 不保证可并发调用，调度器只会串行使用
#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn validate_address(&self, address: &str) -> bool;

    /// `amount` 是已经格式化好的币串，例如 `10000000ustars,1uatom`
    async fn send(&self, to: &str, amount: &str) -> Result<String, LedgerError>;
}

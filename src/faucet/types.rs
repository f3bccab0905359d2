use serde::Serialize;

use crate::ledger::LedgerError;

/// 已准入、等待发送的请求，只在内存中传递
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest {
    pub id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user: String,
    pub user_id: String,
    pub amount: String,
    pub address: String,
}

/// 一次发送的结果，带着来源信息回到原频道
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResponse {
    pub id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user: String,
    pub user_id: String,
    pub tx_hash: String,
    pub success: bool,
    pub error: String,
}

impl SendResponse {
    pub fn from_result(req: SendRequest, result: Result<String, LedgerError>) -> Self {
        match result {
            Ok(tx_hash) => Self::new(req, tx_hash, true, String::new()),
            Err(e) => Self::new(
                req,
                e.tx_hash().map(str::to_owned).unwrap_or_default(),
                false,
                e.to_string(),
            ),
        }
    }

    /// 没有调用链客户端就失败的请求 (例如停机时还在排队)
    pub fn failed(req: SendRequest, error: impl Into<String>) -> Self {
        Self::new(req, String::new(), false, error.into())
    }

    fn new(req: SendRequest, tx_hash: String, success: bool, error: String) -> Self {
        Self {
            id: req.id,
            guild_id: req.guild_id,
            channel_id: req.channel_id,
            channel_name: req.channel_name,
            user: req.user,
            user_id: req.user_id,
            tx_hash,
            success,
            error,
        }
    }
}

//! 单元测试用的假链客户端、假聊天网关

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::{ChannelInfo, ChatGateway, GatewayError};
use crate::config::Config;
use crate::ledger::{LedgerClient, LedgerError};

#[derive(Default)]
pub(crate) struct MockLedger {
    pub sent: Mutex<Vec<(String, String)>>,
    pub sent_at: Mutex<Vec<tokio::time::Instant>>,
    pub failing: HashSet<String>,
}

impl MockLedger {
    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            failing: addresses.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn sent_addresses(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(to, _)| to.clone()).collect()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn validate_address(&self, address: &str) -> bool {
        address.starts_with("stars1") && address.len() > "stars1".len() && !address.contains('!')
    }

    async fn send(&self, to: &str, amount: &str) -> Result<String, LedgerError> {
        self.sent_at.lock().unwrap().push(tokio::time::Instant::now());
        let n = {
            let mut sent = self.sent.lock().unwrap();
            sent.push((to.to_string(), amount.to_string()));
            sent.len()
        };
        if self.failing.contains(to) {
            return Err(LedgerError::Network("connection refused".into()));
        }
        Ok(format!("HASH{n}"))
    }
}

#[derive(Default)]
pub(crate) struct MockGateway {
    pub replies: Mutex<Vec<(String, String)>>,
    pub channels: Vec<ChannelInfo>,
    pub fail_replies: bool,
}

impl MockGateway {
    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn send_reply(&self, channel_id: &str, text: &str) -> Result<(), GatewayError> {
        self.replies
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        if self.fail_replies {
            return Err(GatewayError::Http {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, GatewayError> {
        Ok(self.channels.clone())
    }
}

pub(crate) fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut env: std::collections::HashMap<String, String> = [
        ("FAUCET_BOT_TOKEN", "token"),
        ("FAUCET_BOT_USER_ID", "bot"),
        ("FAUCET_WEBHOOK_SECRET", "secret"),
        ("FAUCET_CLIENT_RPC_ENDPOINT", "http://localhost:26657"),
        ("FAUCET_CLIENT_API_ENDPOINT", "http://localhost:1317"),
        ("FAUCET_CLIENT_SIGNER_ENDPOINT", "http://localhost:9000"),
        ("FAUCET_CLIENT_ACCOUNT_PREFIX", "stars"),
        ("FAUCET_CLIENT_GAS_PRICES", "1ustars"),
        ("FAUCET_CLIENT_CHAIN_ID", "elgafar-1"),
        ("FAUCET_ADDRESS", "stars1faucet"),
        ("FAUCET_EXPLORER_URL", "https://explorer/tx"),
        ("FAUCET_CHANNEL_AMOUNTS", "faucet:10_000_000ustars;private:1ustars"),
        ("FAUCET_CHANNEL_INTERVAL", "faucet:1h"),
        ("FAUCET_DISPATCH_DELAY", "5s"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

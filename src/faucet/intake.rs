use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::command::{Command, parse_command};
use super::replies;
use super::types::SendRequest;
use crate::chat::{ChatGateway, MessageEvent};
use crate::config::Config;
use crate::gate::{Admission, AdmissionGate, scope_id};
use crate::ledger::LedgerClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    Usage,
    InvalidAddress,
    RateLimited { retry_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntakeOutcome {
    Ignored,
    Rejected(Rejection),
    Queued { request_id: String },
    /// 发送队列已关闭 (正在停机)
    Unavailable,
}

/// 把聊天消息变成 SendRequest 放进发送队列
///
/// 顺序: 解析 -> 地址校验 -> 占队列位置 -> 准入并入队 -> 回复确认。
/// 队列满时占位会等待，调度器慢的时候回复也会跟着变慢。
pub struct RequestIntake {
    config: Arc<Config>,
    gate: AdmissionGate,
    ledger: Arc<dyn LedgerClient>,
    gateway: Arc<dyn ChatGateway>,
    requests: mpsc::Sender<SendRequest>,
}

impl RequestIntake {
    pub fn new(
        config: Arc<Config>,
        gate: AdmissionGate,
        ledger: Arc<dyn LedgerClient>,
        gateway: Arc<dyn ChatGateway>,
        requests: mpsc::Sender<SendRequest>,
    ) -> Self {
        Self {
            config,
            gate,
            ledger,
            gateway,
            requests,
        }
    }

    pub async fn handle(&self, event: &MessageEvent) -> IntakeOutcome {
        // 忽略机器人自己的消息
        if event.author_is_bot || self.config.bot_user_id.as_deref() == Some(event.author_id.as_str()) {
            return IntakeOutcome::Ignored;
        }

        let Some(channel) = self.config.channel_coins(&event.channel_name) else {
            return IntakeOutcome::Ignored;
        };

        let address = match parse_command(&event.content, &self.config.client.account_prefix) {
            Command::Ignore => return IntakeOutcome::Ignored,
            Command::Usage => {
                self.reply(&event.channel_id, &replies::usage(&event.author_id)).await;
                return IntakeOutcome::Rejected(Rejection::Usage);
            }
            Command::Request(address) => address,
        };

        if !self.ledger.validate_address(&address) {
            tracing::info!(address = %address, user_id = %event.author_id, "invalid address");
            self.reply(&event.channel_id, &replies::usage(&event.author_id)).await;
            return IntakeOutcome::Rejected(Rejection::InvalidAddress);
        }

        // 先占住队列位置再做准入，等待期间被取消不会白白消耗冷却时间
        let permit = match self.requests.clone().reserve_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::error!(user_id = %event.author_id, "request queue closed");
                self.reply(&event.channel_id, &replies::failed(&event.author_id)).await;
                return IntakeOutcome::Unavailable;
            }
        };

        let req = SendRequest {
            id: Uuid::now_v7().to_string(),
            guild_id: event.guild_id.clone(),
            channel_id: event.channel_id.clone(),
            channel_name: event.channel_name.clone(),
            user: event.author_name.clone(),
            user_id: event.author_id.clone(),
            amount: channel.coins.clone(),
            address: address.clone(),
        };
        let request_id = req.id.clone();
        let cooldown = self.config.channel_interval(&event.channel_name);
        let scope = scope_id(&event.guild_id, &event.channel_id);
        let gate = self.gate.clone();

        // 准入会同步刷盘，放到阻塞线程里；准入和入队在同一个任务里完成，
        // 调用方中途放弃也会一起做完
        let admission = tokio::task::spawn_blocking(move || {
            let admission = gate.try_admit(&scope, &req.address, &req.user_id, cooldown);
            if !admission.is_blocked() {
                tracing::info!(
                    request_id = %req.id,
                    channel = %req.channel_name,
                    user = %req.user,
                    user_id = %req.user_id,
                    amount = %req.amount,
                    address = %req.address,
                    "sending request"
                );
                let _ = permit.send(req);
            }
            admission
        })
        .await;

        match admission {
            Ok(Admission::Admitted) => {
                self.reply(&event.channel_id, &replies::queued(&event.author_id)).await;
                IntakeOutcome::Queued { request_id }
            }
            Ok(Admission::Blocked { retry_at, retry_after }) => {
                tracing::info!(
                    channel = %event.channel_name,
                    user_id = %event.author_id,
                    address = %address,
                    retry_after_secs = retry_after.as_secs(),
                    "request rate limited"
                );
                self.reply(&event.channel_id, &replies::rate_limited(&event.author_id, retry_at))
                    .await;
                IntakeOutcome::Rejected(Rejection::RateLimited { retry_at })
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "admission task failed");
                self.reply(&event.channel_id, &replies::failed(&event.author_id)).await;
                IntakeOutcome::Unavailable
            }
        }
    }

    async fn reply(&self, channel_id: &str, text: &str) {
        if let Err(e) = self.gateway.send_reply(channel_id, text).await {
            tracing::error!(channel_id, error = %e, "error sending message");
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::shutdown_signalled;
use super::types::{SendRequest, SendResponse};
use crate::ledger::LedgerClient;

const SHUTTING_DOWN: &str = "faucet is shutting down";

/// 唯一的发送消费者
///
/// 按入队顺序一个一个发，每次发完 (无论成败) 固定等待一段时间，
/// 避免链上账户序号冲突。失败不重试，只回报一次。
pub struct Dispatcher {
    ledger: Arc<dyn LedgerClient>,
    requests: mpsc::Receiver<SendRequest>,
    responses: mpsc::UnboundedSender<SendResponse>,
    delay: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        requests: mpsc::Receiver<SendRequest>,
        responses: mpsc::UnboundedSender<SendResponse>,
        delay: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger,
            requests,
            responses,
            delay,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(delay_ms = self.delay.as_millis() as u64, "starting request processor");
        loop {
            let req = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut self.shutdown) => break,
                req = self.requests.recv() => match req {
                    Some(req) => req,
                    None => break,
                },
            };

            self.dispatch(req).await;

            tokio::select! {
                biased;
                _ = shutdown_signalled(&mut self.shutdown) => break,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        self.drain();
        tracing::info!("stopping request processor");
    }

    async fn dispatch(&self, req: SendRequest) {
        tracing::info!(
            request_id = %req.id,
            channel = %req.channel_name,
            user = %req.user,
            user_id = %req.user_id,
            amount = %req.amount,
            address = %req.address,
            "processing request"
        );

        let result = self.ledger.send(&req.address, &req.amount).await;
        if let Err(e) = &result {
            tracing::error!(request_id = %req.id, error = %e, "error sending request");
        }
        self.emit(SendResponse::from_result(req, result));
    }

    /// 停机时仍在排队的请求直接以失败回报，保证每个请求都有一次回复
    fn drain(&mut self) {
        self.requests.close();
        while let Ok(req) = self.requests.try_recv() {
            tracing::warn!(request_id = %req.id, "dropping queued request on shutdown");
            self.emit(SendResponse::failed(req, SHUTTING_DOWN));
        }
    }

    fn emit(&self, response: SendResponse) {
        if let Err(e) = self.responses.send(response) {
            tracing::error!(response_id = %e.0.id, "response processor is gone, dropping response");
        }
    }
}

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::replies;
use super::shutdown_signalled;
use super::types::SendResponse;
use crate::chat::ChatGateway;

/// 把发送结果回复到原频道，和调度器分开跑，回复慢不会拖住发送
pub struct ResponseRouter {
    gateway: Arc<dyn ChatGateway>,
    explorer_url: String,
    responses: mpsc::UnboundedReceiver<SendResponse>,
    shutdown: watch::Receiver<bool>,
}

impl ResponseRouter {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        explorer_url: String,
        responses: mpsc::UnboundedReceiver<SendResponse>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            gateway,
            explorer_url,
            responses,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("starting response processor");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_signalled(&mut self.shutdown) => break,
                response = self.responses.recv() => match response {
                    Some(response) => self.deliver(response).await,
                    None => {
                        tracing::info!("stopping response processor");
                        return;
                    }
                },
            }
        }

        // 停机后把调度器已经产生的结果发完，调度器退出后通道关闭
        while let Some(response) = self.responses.recv().await {
            self.deliver(response).await;
        }
        tracing::info!("stopping response processor");
    }

    async fn deliver(&self, response: SendResponse) {
        tracing::info!(
            response_id = %response.id,
            channel = %response.channel_name,
            user = %response.user,
            user_id = %response.user_id,
            tx_hash = %response.tx_hash,
            success = response.success,
            error = %response.error,
            "processing response"
        );

        let reply = if response.success {
            replies::succeeded(&response.user_id, &self.explorer_url, &response.tx_hash)
        } else {
            replies::failed(&response.user_id)
        };
        if let Err(e) = self.gateway.send_reply(&response.channel_id, &reply).await {
            tracing::error!(response_id = %response.id, error = %e, "error sending message");
        }
    }
}

//! 水龙头主流程
//!
//! 聊天消息 -> RequestIntake (解析、校验、准入) -> 发送队列 -> Dispatcher
//! -> 链客户端 -> ResponseRouter -> 回复到原频道

pub mod command;
pub mod dispatch;
pub mod intake;
pub mod replies;
pub mod router;
pub mod types;
pub mod welcome;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

pub use dispatch::Dispatcher;
pub use intake::{IntakeOutcome, Rejection, RequestIntake};
pub use router::ResponseRouter;
pub use types::{SendRequest, SendResponse};
pub use welcome::send_welcome;

use crate::chat::ChatGateway;
use crate::config::Config;
use crate::gate::AdmissionGate;
use crate::ledger::LedgerClient;

/// 发送队列容量，调度器忙时入队方会等待
pub const REQUEST_QUEUE_CAPACITY: usize = 1;

/// 等待停机信号，发送端被丢弃也视为停机
pub(crate) async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// 组装好的三段流水线，调用方负责把 dispatcher 和 router 放到后台任务里
pub struct Pipeline {
    pub intake: Arc<RequestIntake>,
    pub dispatcher: Dispatcher,
    pub router: ResponseRouter,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        gate: AdmissionGate,
        ledger: Arc<dyn LedgerClient>,
        gateway: Arc<dyn ChatGateway>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher::new(
            ledger.clone(),
            request_rx,
            response_tx,
            config.dispatch_delay,
            shutdown.clone(),
        );
        let router = ResponseRouter::new(
            gateway.clone(),
            config.explorer_url.clone(),
            response_rx,
            shutdown,
        );
        let intake = Arc::new(RequestIntake::new(config, gate, ledger, gateway, request_tx));

        Self {
            intake,
            dispatcher,
            router,
        }
    }
}

use std::sync::Arc;

use crate::config::Config;
use crate::faucet::RequestIntake;

pub mod chat;
pub mod config;
pub mod error;
pub mod faucet;
pub mod gate;
pub mod ledger;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub intake: Arc<RequestIntake>,
}

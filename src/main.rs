use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use faucet_bot::{
    AppState,
    chat::DiscordGateway,
    config::Config,
    faucet::{Pipeline, send_welcome},
    gate::{AdmissionGate, SystemClock},
    ledger::RestLedgerClient,
    router::create_router,
    store::SledStore,
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Arc::new(Config::from_env().expect("Failed to load configuration"));
    tracing::info!("starting server");

    // 打开本地存储
    let store = SledStore::open(config.store_file()).expect("Failed to open store");

    let ledger = Arc::new(
        RestLedgerClient::new(config.client.clone(), config.faucet_address.clone())
            .expect("Failed to create ledger client"),
    );
    tracing::info!(address = %ledger.faucet_address(), "using faucet address");

    let gateway = Arc::new(
        DiscordGateway::new(&config.discord_api_url, &config.bot_token)
            .expect("Failed to create chat gateway"),
    );

    let gate = AdmissionGate::new(Arc::new(store.clone()), Arc::new(SystemClock));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pipeline = Pipeline::new(
        config.clone(),
        gate,
        ledger,
        gateway.clone(),
        shutdown_rx.clone(),
    );
    let dispatcher = tokio::spawn(pipeline.dispatcher.run());
    let responder = tokio::spawn(pipeline.router.run());

    send_welcome(&config, gateway.as_ref()).await;

    let state = AppState {
        config: config.clone(),
        intake: pipeline.intake,
    };
    let app = create_router(state);

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Server listening on {}", addr);

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("stopping server");
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
    {
        tracing::error!(error = %e, "server error");
    }

    // 当前这一笔发送和回复允许做完
    if let Err(e) = dispatcher.await {
        tracing::error!(error = %e, "request processor panicked");
    }
    if let Err(e) = responder.await {
        tracing::error!(error = %e, "response processor panicked");
    }
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "error closing store");
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

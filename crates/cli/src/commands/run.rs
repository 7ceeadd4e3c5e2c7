use std::net::SocketAddr;
use std::sync::Arc;

use ailvi_core::{Outbox, env_non_empty, env_required};
use ailvi_http::{WebhookState, webhook_path, webhook_router};
use ailvi_telegram::{Dispatcher, TelegramClient, run_polling};
use anyhow::Result;

use crate::{build_engine, port, shutdown_signal};

pub(crate) async fn run() -> Result<()> {
    let token = env_required("TELEGRAM_BOT_TOKEN")?;
    let mode = env_non_empty("MODE").unwrap_or_else(|| "polling".to_owned()).to_lowercase();
    let webhook_base = env_non_empty("WEBHOOK_BASE");
    match (mode.as_str(), &webhook_base) {
        ("polling", _) | ("webhook", Some(_)) => {},
        ("webhook", None) => anyhow::bail!("WEBHOOK_BASE is required for webhook mode"),
        (other, _) => anyhow::bail!("unknown MODE: {other} (expected polling or webhook)"),
    }

    let engine = Arc::new(build_engine().await?);
    let telegram = Arc::new(TelegramClient::new(token)?);
    let outbox: Arc<dyn Outbox> = Arc::clone(&telegram) as Arc<dyn Outbox>;
    let dispatcher = Arc::new(Dispatcher::new(engine, outbox));
    let addr = SocketAddr::from(([0, 0, 0, 0], port()));

    match (mode.as_str(), webhook_base) {
        ("webhook", Some(base)) => {
            let secret = env_non_empty("WEBHOOK_SECRET").unwrap_or_else(|| "secret".to_owned());
            let url = format!("{}{}", base.trim_end_matches('/'), webhook_path(&secret));
            tracing::info!("Starting webhook at {}", url);
            telegram.set_webhook(&url, &secret).await?;

            let router = webhook_router(Arc::new(WebhookState { dispatcher, secret }));
            ailvi_http::serve(addr, router, shutdown_signal()).await
        },
        _ => {
            let health = tokio::spawn(ailvi_http::serve(
                addr,
                ailvi_http::health_router(),
                shutdown_signal(),
            ));
            run_polling(&telegram, &dispatcher, shutdown_signal()).await?;
            health.await?
        },
    }
}

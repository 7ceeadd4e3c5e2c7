use std::net::SocketAddr;

use anyhow::Result;

use crate::shutdown_signal;

pub(crate) async fn run(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    ailvi_http::serve(addr, ailvi_http::health_router(), shutdown_signal()).await
}

use anyhow::Context;
use p25chnlzr::ChnlzrConfigExt;
use p25config::get_config;
use p25dcodr::{DcodrApiDoc, DcodrConfigExt, DcodrState};
use p25monitor::{HttpEndpoints, MonitorConfigExt, RetryingControlChannelMonitor};
use p25server::{LoggingOptions, Server};
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();

    let mut server = Server::new_configured();
    server.init_logging(LoggingOptions::from_config()).await;
    server.add_info_route().await;

    // ========== Channelizer hosts ==========
    let chnlzr = config
        .get_chnlzr_settings()
        .context("unable to read the chnlzr hosts")?
        .controller();
    info!("📡 {} chnlzr host(s) configured", chnlzr.len());

    // ========== Channel registry ==========
    let monitor_settings = config.get_monitor_settings();
    let endpoints = Arc::new(
        HttpEndpoints::new(config.get_base_url(), monitor_settings.qualify_timeout)
            .context("unable to build the HTTP client")?,
    );
    let traffic = endpoints.clone();
    let registry = RetryingControlChannelMonitor::new(monitor_settings, endpoints.clone(), endpoints);

    // ========== HTTP resources ==========
    let state = DcodrState::new(
        config.get_dcodr_settings(),
        Arc::new(chnlzr),
        Arc::new(registry),
        traffic,
    );
    info!("🎛️ DSP pool of {} pipeline(s)", state.dsp.size());
    server
        .add_documented_router("/", p25dcodr::router(state), DcodrApiDoc::openapi(), "dcodr")
        .await;

    info!("🌐 Starting HTTP server...");
    server.start().await?;

    info!("✅ P25Dcodr is ready at {}", server.info().base_url);
    server.wait().await;

    Ok(())
}

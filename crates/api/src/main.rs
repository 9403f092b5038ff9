use anyhow::Context;

use workbench_core::WorkbenchConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    workbench_observability::init();

    let config = WorkbenchConfig::from_env();
    let bind = config.bind;
    let app = workbench_api::app::build_app(config).await;

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

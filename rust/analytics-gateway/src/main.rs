use analytics_gateway::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    analytics_gateway::run().await
}

use anyhow::Result;
use tb_cli::{config::RelayArgs, init_tracing, run_relay};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = RelayArgs::parse_config()?;
    run_relay(config).await
}

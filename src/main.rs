#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gossipchain::node::run_cli().await
}

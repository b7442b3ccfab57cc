#[tokio::main]
async fn main() -> anyhow::Result<()> {
    secure_provider::cli::run_cli().await
}

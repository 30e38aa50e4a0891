use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    ragchat::cli::run_cli().await
}

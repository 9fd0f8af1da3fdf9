use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mend_cli::run().await
}

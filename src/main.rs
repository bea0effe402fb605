use anyhow::Result;
use taskweave::cli::App;

#[tokio::main]
async fn main() -> Result<()> {
    App::from_env().await
}

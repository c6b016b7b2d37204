#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    content_studio::server::run().await
}

#[tokio::main]
async fn main() -> chatrelay::error::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("chatrelay=info"))
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        log::debug!("A rustls crypto provider was already installed");
    }

    log::info!("Starting chatrelay Slack bot");

    match chatrelay::slack::run().await {
        Ok(()) => {
            log::info!("Slack bot shut down successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Slack bot encountered an error: {e}");
            Err(e)
        }
    }
}

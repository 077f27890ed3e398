use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

use transactions_config::CONFIG;

#[tokio::main]
async fn main() {
    init_logger();
    match transactions_app::run().await {
        Ok(outcome) => info!("Transactions stream finished: {outcome:?}"),
        Err(error) => error!("Transactions app failed: {error:?}"),
    }
}

fn init_logger() {
    let subscriber = SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(CONFIG.logging.levels()))
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default subscriber failed");
}

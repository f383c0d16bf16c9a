use tokio::io::BufReader;
use tracing::info;

use roombook::config::Config;
use roombook::console::Console;
use roombook::manager::ReservationManager;
use roombook::store::WalStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // stdout belongs to the console
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(config.log_level)
        .init();

    roombook::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = WalStore::open(config.wal_path())?;
    let mut manager = ReservationManager::new(store);
    if let Some(timeout) = config.store_timeout {
        manager = manager.with_timeout(timeout);
    }

    info!("roombook started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  rooms: {}", config.rooms.join(", "));
    info!(
        "  store_timeout: {}",
        config
            .store_timeout
            .map_or("disabled".to_string(), |t| format!("{}ms", t.as_millis()))
    );

    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();
    Console::new(&manager, &config.rooms, input, output).run().await?;

    info!("roombook stopped");
    Ok(())
}

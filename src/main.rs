use {
    clap::Parser as _,
    crate::{
        config::Config,
        context::App,
        prelude::*,
        sheets::SheetsClient,
        state::StateStore,
    },
};

mod column;
mod config;
mod context;
mod discord_bot;
mod prelude;
mod race;
mod results;
mod scoring;
mod sheets;
mod standings;
mod state;

#[derive(clap::Parser)]
#[clap(version)]
struct Args {
    /// Path to the layout config file. Defaults to race-results-bot.json in the config directories.
    #[clap(long)]
    config: Option<PathBuf>,
    /// Where the current race is remembered across restarts.
    #[clap(long, default_value = "race_state.json")]
    state_file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)] Config(#[from] config::Error),
    #[error("failed to set up Google authentication: {0}")]
    GoogleAuth(#[from] io::Error),
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error(transparent)] Serenity(#[from] serenity::Error),
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let Args { config, state_file } = Args::parse();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let _ = rustls::crypto::ring::default_provider().install_default();
    let default_panic_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("Thread panic: {info}");
        default_panic_hook(info)
    }));
    let config = Config::load(config.as_deref()).await?;
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("race-results-bot/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .use_rustls_tls()
        .hickory_dns(true)
        .https_only(true)
        .build()?;
    let sheet = Arc::new(SheetsClient::new(http_client, config.spreadsheet_id, config.service_account_key).await?);
    let app = App::new(sheet, StateStore::new(state_file), config.layout);
    log::info!("starting with race state file {}", app.state.path().display());
    discord_bot::run(&config.discord_token, app).await?;
    Ok(())
}

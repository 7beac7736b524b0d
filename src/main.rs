use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Instant;
use teloxide::dispatching::Dispatcher;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::update_listeners::Polling;

use vidrelay::cli::{Cli, Commands};
use vidrelay::core::{config, health, init_logger, log_startup_configuration, logging, DfProbe, DiskGuard};
use vidrelay::download::{
    FfmpegProber, FormatResolver, MediaExtractor, Pipeline, PipelineSettings, ProgressThrottle, SelectionTokenStore,
    YtDlpExtractor,
};
use vidrelay::telegram::{create_bot, schema, setup_bot_commands, CredentialStore, HandlerDeps, TeloxideTransport};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, bot creation).
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present, before any config is read
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH, &config::LOG_LEVEL)?;

    match cli.command {
        Some(Commands::Formats { url, cookies }) => print_formats(&url, cookies).await,
        Some(Commands::Run) | None => run_bot().await,
    }
}

/// Resolves `url` and prints the encodings a user would be offered
async fn print_formats(url: &str, cookies: Option<String>) -> Result<()> {
    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlpExtractor::from_config());
    let resolver = FormatResolver::new(extractor);
    let cookies = cookies.map(std::path::PathBuf::from).or_else(config::default_cookies_file);

    match resolver.resolve(url, cookies.as_deref()).await {
        Ok(resolved) => {
            println!("{}", resolved.title);
            for encoding in &resolved.encodings {
                println!("  [{}] {}", encoding.format_id, encoding.button_label());
            }
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

async fn run_bot() -> Result<()> {
    log_startup_configuration();
    logging::check_external_tools().await;

    let download_dir = config::download_dir();
    fs_err::tokio::create_dir_all(&download_dir).await?;
    fs_err::tokio::create_dir_all(config::cookies_dir()).await?;

    // Liveness endpoint runs on its own thread and runtime
    if let Err(e) = health::spawn_health_server(*config::health::PORT) {
        log::error!("Failed to start liveness thread: {}", e);
    }

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let transport = TeloxideTransport::shared(bot.clone());
    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlpExtractor::from_config());
    let prober = Arc::new(FfmpegProber::from_config());
    let guard = DiskGuard::new(Arc::new(DfProbe::new(download_dir.clone())));
    let throttle = Arc::new(ProgressThrottle::new(config::progress::throttle_window()));

    let pipeline = Pipeline::new(
        Arc::clone(&extractor),
        prober,
        Arc::clone(&transport),
        guard,
        Arc::clone(&throttle),
        PipelineSettings {
            download_dir,
            min_free_bytes: config::admission::min_free_bytes(),
        },
    );

    let tokens = Arc::new(SelectionTokenStore::new(config::selection::token_ttl()));
    SelectionTokenStore::spawn_sweeper(Arc::clone(&tokens), config::selection::sweep_interval());
    spawn_throttle_sweeper(throttle);

    let credentials = Arc::new(CredentialStore::new(config::cookies_dir(), config::default_cookies_file()));

    let deps = HandlerDeps::new(transport, FormatResolver::new(extractor), tokens, credentials, pipeline);

    log::info!("Starting bot in long polling mode");
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

fn spawn_throttle_sweeper(throttle: Arc<ProgressThrottle<vidrelay::telegram::MessageRef>>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config::selection::sweep_interval());
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = throttle.sweep(Instant::now(), config::progress::state_ttl());
            if removed > 0 {
                log::info!("Swept {} idle progress entries", removed);
            }
        }
    });
}

mod settings;
mod shell;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::settings::SettingsStore;
use crate::shell::Shell;

/// Terminal front end for chat, text-to-image and image editing.
///
/// Logs go to stderr so streamed replies on stdout stay readable; set
/// `RUST_LOG` to raise verbosity.
#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = SettingsStore::load();
    let settings = store.settings();
    let Some(config) = settings.to_provider_config() else {
        tracing::error!(path = ?store.config_path(), "no API key configured");
        eprintln!("{}", settings.locale.message("error_missing_api_key"));
        return ExitCode::FAILURE;
    };

    let provider = match atelier_llm::create_provider(config) {
        Ok(provider) => provider,
        Err(error) => {
            tracing::error!(error = %error, "failed to create provider");
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(provider = provider.id(), name = provider.name(), "provider ready");

    let mut shell = Shell::new(provider, store, tokio::io::stdout());
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    match shell.run(input).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "shell stopped");
            ExitCode::FAILURE
        }
    }
}

//! plauder-server Binary
//!
//! Aufruf: `plauder-server [CONFIG]`. Ohne Argument gilt `PLAUDER_CONFIG`,
//! danach `plauder.toml` im Arbeitsverzeichnis.

use anyhow::{Context, Result};
use plauder_server::{
    config::{LoggingEinstellungen, ServerConfig},
    Server,
};
use tracing_subscriber::{fmt, EnvFilter};

const STANDARD_CONFIG: &str = "plauder.toml";

fn config_pfad() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PLAUDER_CONFIG").ok())
        .unwrap_or_else(|| STANDARD_CONFIG.to_string())
}

/// `RUST_LOG` hat Vorrang vor `logging.level`
fn logging_starten(einstellungen: &LoggingEinstellungen) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&einstellungen.level)
            .with_context(|| format!("Ungueltiges Log-Level '{}'", einstellungen.level))?,
    };

    // Die Steuerschleife laeuft auf einem eigenen Thread
    let basis = fmt().with_env_filter(filter).with_thread_names(true);
    let ergebnis = if einstellungen.format == "json" {
        basis.json().with_current_span(false).try_init()
    } else {
        basis.compact().try_init()
    };
    ergebnis.map_err(|e| anyhow::anyhow!("Logging konnte nicht gestartet werden: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let pfad = config_pfad();
    let config = ServerConfig::laden(&pfad)?;
    logging_starten(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %pfad,
        bind = %config.netzwerk.bind_adresse,
        port = config.netzwerk.port,
        "plauder startet"
    );

    Server::neu(config)?.starten().await
}

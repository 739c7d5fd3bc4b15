//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, Context};
use plauder_protocol::wire::MIN_MAX_FRAME_SIZE;
use plauder_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Challenge-Response
    pub auth: AuthEinstellungen,
    /// Benutzerspeicher
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Beim Start angelegte Benutzer (`[[benutzer]]`)
    pub benutzer: Vec<BenutzerEintrag>,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: usize,
    /// Abstand der periodischen 205-Benachrichtigung (0 = aus)
    pub list_refresh_secs: u64,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Plauder Server".into(),
            max_clients: 512,
            list_refresh_secs: 0,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse des Listeners
    pub bind_adresse: String,
    /// TCP-Port
    pub port: u16,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_size: usize,
    /// Maximale Wartezeit eines Polls in Millisekunden
    pub tick_ms: u64,
    /// Grenze fuer ausstehende Ausgaben pro Verbindung in Bytes
    pub max_ausstehend: usize,
    /// Untaetige Verbindungen trennen nach so vielen Sekunden (0 = nie)
    pub idle_timeout_secs: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 7777,
            max_frame_size: 4096,
            tick_ms: 200,
            max_ausstehend: 64 * 1024,
            idle_timeout_secs: 0,
        }
    }
}

/// Challenge-Response-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// Gueltigkeit einer Challenge in Sekunden
    pub challenge_timeout_secs: u64,
}

impl Default for AuthEinstellungen {
    fn default() -> Self {
        Self {
            challenge_timeout_secs: 30,
        }
    }
}

/// Benutzerspeicher-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// JSON-Snapshot, beim Start geladen und beim Beenden geschrieben
    /// (leer = nur im Speicher)
    pub snapshot: Option<String>,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Ein vorkonfigurierter Benutzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenutzerEintrag {
    pub name: String,
    /// Gemeinsames Secret als Hex-String
    pub secret: String,
    #[serde(default)]
    pub pubkey: Option<String>,
}

impl BenutzerEintrag {
    /// Dekodiertes Secret
    pub fn secret_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = hex::decode(&self.secret)
            .with_context(|| format!("Secret von '{}' ist kein gueltiges Hex", self.name))?;
        if bytes.is_empty() {
            bail!("Secret von '{}' ist leer", self.name);
        }
        Ok(bytes)
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei und prueft sie.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config
            .pruefen()
            .with_context(|| format!("Ungueltige Konfiguration in '{pfad}'"))?;
        Ok(config)
    }

    /// Prueft Wertebereiche, die serde allein nicht abdeckt
    pub fn pruefen(&self) -> anyhow::Result<()> {
        let port = self.netzwerk.port;
        if port < 1024 {
            bail!("Port {port} ungueltig, erlaubt ist 1024 bis 65535");
        }
        if self.netzwerk.max_frame_size < MIN_MAX_FRAME_SIZE {
            bail!(
                "max_frame_size {} ist kleiner als {MIN_MAX_FRAME_SIZE}",
                self.netzwerk.max_frame_size
            );
        }
        if self.netzwerk.tick_ms == 0 {
            bail!("tick_ms muss groesser als 0 sein");
        }
        if self.server.max_clients == 0 {
            bail!("max_clients muss groesser als 0 sein");
        }
        for eintrag in &self.benutzer {
            if eintrag.name.trim().is_empty() {
                bail!("Benutzer ohne Namen in [[benutzer]]");
            }
            eintrag.secret_bytes()?;
        }
        self.bind_adresse()?;
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let text = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port);
        text.parse()
            .with_context(|| format!("Bind-Adresse '{text}' ist ungueltig"))
    }

    /// Einstellungen fuer die Steuerschleife
    pub fn signaling_config(&self) -> SignalingConfig {
        let idle = self.netzwerk.idle_timeout_secs;
        SignalingConfig {
            max_frame_size: self.netzwerk.max_frame_size,
            tick: Duration::from_millis(self.netzwerk.tick_ms),
            challenge_timeout: Duration::from_secs(self.auth.challenge_timeout_secs),
            idle_timeout: (idle > 0).then(|| Duration::from_secs(idle)),
            max_pending_output: self.netzwerk.max_ausstehend,
            max_verbindungen: self.server.max_clients,
        }
    }

    /// Intervall der periodischen Listen-Benachrichtigung, falls aktiv
    pub fn listen_intervall(&self) -> Option<Duration> {
        let secs = self.server.list_refresh_secs;
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

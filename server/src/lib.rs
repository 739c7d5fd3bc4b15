//! plauder-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use std::{future::Future, net::SocketAddr};

use anyhow::{Context, Result};
use config::ServerConfig;
use plauder_db::MemoryUserStore;
use plauder_signaling::{ControlLoop, MioReactor, ServerHandle};

/// Haelt den gebundenen, noch nicht laufenden Server zusammen
pub struct Server {
    config: ServerConfig,
    store: MemoryUserStore,
    schleife: ControlLoop<MioReactor, MemoryUserStore>,
    adresse: SocketAddr,
}

impl Server {
    /// Bereitet den Benutzerspeicher vor und bindet den Listener
    ///
    /// Reihenfolge:
    /// 1. Snapshot laden (falls konfiguriert)
    /// 2. Benutzer aus `[[benutzer]]` anlegen
    /// 3. Listener binden, Steuerschleife erstellen
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let store = store_vorbereiten(&config)?;

        let bind = config.bind_adresse()?;
        let reactor = MioReactor::binden(bind, config.netzwerk.max_ausstehend)
            .with_context(|| format!("Listener auf {bind} konnte nicht gebunden werden"))?
            .mit_frame_groesse(config.netzwerk.max_frame_size);
        let adresse = reactor.lokale_adresse()?;

        let schleife = ControlLoop::neu(reactor, store.clone(), config.signaling_config());

        Ok(Self {
            config,
            store,
            schleife,
            adresse,
        })
    }

    /// Tatsaechlich gebundene Adresse (relevant bei Port 0)
    pub fn lokale_adresse(&self) -> SocketAddr {
        self.adresse
    }

    pub fn handle(&self) -> ServerHandle {
        self.schleife.handle()
    }

    pub fn store(&self) -> &MemoryUserStore {
        &self.store
    }

    /// Laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        self.laufen_bis(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => {
                    tracing::error!(fehler = %e, "Signal-Handler konnte nicht registriert werden")
                }
            }
        })
        .await
    }

    /// Laeuft, bis `shutdown` fertig ist oder die Steuerschleife abbricht
    ///
    /// Die Steuerschleife blockiert in `poll` und laeuft deshalb auf einem
    /// Blocking-Thread. Danach wird der Snapshot geschrieben.
    pub async fn laufen_bis<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server {
            config,
            store,
            mut schleife,
            adresse,
        } = self;

        tracing::info!(
            server_name = %config.server.name,
            adresse = %adresse,
            benutzer = config.benutzer.len(),
            "Server laeuft"
        );

        let handle = schleife.handle();
        let mut schleife_task = tokio::task::spawn_blocking(move || schleife.run());

        let notifier = config.listen_intervall().map(|intervall| {
            let handle = handle.clone();
            tokio::spawn(async move {
                let mut takt = tokio::time::interval(intervall);
                // Der erste Tick kommt sofort
                takt.tick().await;
                while handle.laeuft() {
                    takt.tick().await;
                    handle.notify_lists_changed();
                }
            })
        });

        tokio::pin!(shutdown);
        let vorzeitig = tokio::select! {
            _ = &mut shutdown => None,
            ergebnis = &mut schleife_task => Some(ergebnis),
        };
        let ergebnis = match vorzeitig {
            Some(ergebnis) => ergebnis,
            None => {
                handle.stop();
                schleife_task.await
            }
        };

        if let Some(notifier) = notifier {
            notifier.abort();
        }

        if let Some(pfad) = &config.datenbank.snapshot {
            store
                .speichern(pfad)
                .with_context(|| format!("Snapshot '{pfad}' konnte nicht geschrieben werden"))?;
        }

        ergebnis.context("Steuerschleife ist abgestuerzt")??;
        tracing::info!("Server beendet");
        Ok(())
    }
}

fn store_vorbereiten(config: &ServerConfig) -> Result<MemoryUserStore> {
    let store = match &config.datenbank.snapshot {
        Some(pfad) => MemoryUserStore::laden(pfad)
            .with_context(|| format!("Snapshot '{pfad}' konnte nicht geladen werden"))?,
        None => MemoryUserStore::neu(),
    };

    for eintrag in &config.benutzer {
        store.benutzer_setzen(&eintrag.name, &eintrag.secret_bytes()?, eintrag.pubkey.clone());
        tracing::debug!(user = %eintrag.name, "Benutzer aus Konfiguration angelegt");
    }
    Ok(store)
}

//! Process-wide resources for one harvest run
//!
//! `Lifecycle` owns the validated configuration, the shared HTTP client, the
//! shutdown token every stage races against, and the log writer guard. It is
//! built once in `main` and borrowed by everything else.

use crate::config::Config;
use crate::crawler::build_http_client;
use crate::Result;
use reqwest::Client;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;

pub struct Lifecycle {
    config: Config,
    config_hash: String,
    client: Client,
    shutdown: CancellationToken,
    signals: Option<JoinHandle<()>>,
    // Flushes buffered file logs when the lifecycle is dropped
    _log_guard: Option<WorkerGuard>,
}

impl Lifecycle {
    /// Builds the shared HTTP client and a fresh shutdown token
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `config_hash` - SHA-256 of the config file, recorded per execution
    /// * `log_guard` - Guard of the non-blocking file log writer, if any
    pub fn new(config: Config, config_hash: String, log_guard: Option<WorkerGuard>) -> Result<Self> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout),
        )?;

        Ok(Self {
            config,
            config_hash,
            client,
            shutdown: CancellationToken::new(),
            signals: None,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Token cancelled when the run should stop
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Cancels the shutdown token on Ctrl-C
    ///
    /// Further interrupts are logged and otherwise ignored so the final
    /// flush can complete.
    ///
    /// The listener stays installed until the lifecycle is dropped, so an
    /// interrupt that arrives after the harvest loop, while results are
    /// exported and printed, is still observed. Installing twice is a no-op.
    pub fn install_signal_handler(&mut self) {
        if self.signals.is_some() {
            return;
        }
        let shutdown = self.shutdown.clone();

        self.signals = Some(tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Could not listen for interrupts: {}", e);
                    return;
                }

                if shutdown.is_cancelled() {
                    tracing::warn!("Interrupt received again; still saving results");
                } else {
                    tracing::info!("Interrupt received, stopping after saving results");
                    shutdown.cancel();
                }
            }
        }));
    }

    /// Whether the Ctrl-C listener is installed and still running
    pub fn is_listening_for_signals(&self) -> bool {
        self.signals.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if let Some(handle) = self.signals.take() {
            handle.abort();
        }
    }
}

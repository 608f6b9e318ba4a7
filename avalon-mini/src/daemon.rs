//! Daemon lifecycle: start the monitor and API, run until signalled, shut
//! down cleanly.

use std::time::Duration;

use tokio::signal::unix::{self, SignalKind};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::api;
use crate::config::Config;
use crate::monitor::Monitor;
use crate::protocol::Client;
use crate::tracing::prelude::*;

/// How long to wait for tasks after cancelling them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The main daemon.
pub struct Daemon {
    config: Config,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Run the daemon until SIGINT or SIGTERM.
    ///
    /// Returns the API server's error if it fails, e.g. can't bind its
    /// address, after shutting everything else down.
    pub async fn run(self) -> anyhow::Result<()> {
        let client = Client::new(self.config.endpoint.clone())
            .with_timeout(self.config.timeout)
            .with_status_command(self.config.status_command.clone());

        let (monitor, handle) = Monitor::new(
            Box::new(client),
            self.config.poll_interval,
            self.config.power_grace,
        );
        self.tracker.spawn(monitor.run(self.shutdown.clone()));

        let mut api_task = self
            .tracker
            .spawn(api::serve(self.config.api_addr, handle, self.shutdown.clone()));

        self.tracker.close();

        info!(device = %self.config.endpoint, "Started.");
        info!("For debugging, set RUST_LOG=avalon_mini=debug or trace.");

        let mut sigint = unix::signal(SignalKind::interrupt())?;
        let mut sigterm = unix::signal(SignalKind::terminate())?;

        // The API only returns early on failure; there is nothing to
        // control the device through after that.
        let api_failure = tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT.");
                None
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM.");
                None
            },
            result = &mut api_task => {
                let error = match result {
                    Ok(Ok(())) => anyhow::anyhow!("API server stopped unexpectedly"),
                    Ok(Err(e)) => e,
                    Err(e) => anyhow::Error::new(e).context("API server task panicked"),
                };
                error!(error = %format!("{error:#}"), "API server failed, shutting down.");
                Some(error)
            },
        };

        self.shutdown.cancel();

        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(grace = ?SHUTDOWN_GRACE, "Tasks still running at exit");
        }
        info!("Exiting.");

        match api_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_POWER_GRACE, DeviceEndpoint};

    #[tokio::test]
    async fn api_bind_failure_fails_the_daemon() {
        // Hold the API port so the daemon can't bind it.
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = taken.local_addr().unwrap();

        // Nothing listens on the device port; polls are refused.
        let device_port = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let config = Config {
            endpoint: DeviceEndpoint::new("127.0.0.1", device_port, "Den").unwrap(),
            timeout: Duration::from_secs(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
            power_grace: DEFAULT_POWER_GRACE,
            status_command: "estats".into(),
            api_addr,
        };

        let result = tokio::time::timeout(Duration::from_secs(10), Daemon::new(config).run())
            .await
            .expect("daemon should exit on its own");
        let error = result.unwrap_err();
        assert!(format!("{error:#}").contains("failed to bind API listener"));
    }
}

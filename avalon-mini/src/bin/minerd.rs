//! Daemon for monitoring and controlling one Avalon Mini 3.
//!
//! Configuration comes from `AVALON_*` environment variables; see
//! [`avalon_mini::config::Config::from_env`].

use avalon_mini::tracing::{self, prelude::*};
use avalon_mini::{config::Config, daemon::Daemon};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing::init_journald_or_stdout();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    Daemon::new(config).run().await
}

mod config;
mod logging;
mod pwa;
mod rehearsal;
mod state;

use std::{env, process::ExitCode};

use config::{ConfigError, OverlayConfig};
use pwa::PwaWriteError;
use rehearsal::RehearsalError;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pwa(#[from] PwaWriteError),
    #[error(transparent)]
    Rehearsal(#[from] RehearsalError),
    #[error("unknown mode '{0}' (expected `pwa` or `rehearse`)")]
    UnknownMode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Pwa,
    Rehearse,
}

impl Mode {
    fn parse(arg: Option<&str>) -> Result<Self, AppError> {
        match arg.map(str::trim) {
            None | Some("") | Some("pwa") => Ok(Self::Pwa),
            Some("rehearse") => Ok(Self::Rehearse),
            Some(other) => Err(AppError::UnknownMode(other.to_owned())),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "booking-overlay failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let mode = Mode::parse(env::args().nth(1).as_deref())?;
    let config = OverlayConfig::from_env()?;
    info!(?mode, booking_url = %config.booking_url, "starting booking-overlay");

    match mode {
        Mode::Pwa => {
            for path in pwa::write(&config)? {
                info!(path = %path.display(), "wrote artifact");
            }
        }
        Mode::Rehearse => {
            let snapshot = rehearsal::run(&config).await?;
            info!(
                panel = ?snapshot.panel,
                closed = snapshot.closed,
                "rehearsal final snapshot"
            );
        }
    }
    Ok(())
}

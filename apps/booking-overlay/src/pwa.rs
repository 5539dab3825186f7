//! Service worker and manifest artifact emission.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use pwa_config::{PwaConfigError, ServiceWorkerConfig, WebManifest};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::OverlayConfig;

pub const MANIFEST_FILE: &str = "manifest.webmanifest";
pub const SW_CONFIG_FILE: &str = "sw-config.json";

#[derive(Debug, Error)]
pub enum PwaWriteError {
    #[error(transparent)]
    Config(#[from] PwaConfigError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Rendered artifact contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwaArtifacts {
    pub manifest_json: String,
    pub sw_config_json: String,
}

pub fn render(config: &OverlayConfig) -> Result<PwaArtifacts, PwaConfigError> {
    let manifest = WebManifest::new(config.app_name.as_str(), config.app_short_name.as_str())
        .with_theme_color(config.theme_color.as_str());
    let service_worker = ServiceWorkerConfig::for_booking_site(&config.booking_url)?;
    debug!(
        rules = service_worker.runtime_caching.len(),
        icons = manifest.icons.len(),
        "rendering pwa artifacts"
    );

    Ok(PwaArtifacts {
        manifest_json: manifest.to_json()?,
        sw_config_json: service_worker.to_json()?,
    })
}

/// Render and write both artifacts under `config.pwa_out_dir`.
pub fn write(config: &OverlayConfig) -> Result<Vec<PathBuf>, PwaWriteError> {
    let artifacts = render(config)?;
    let out_dir = config.pwa_out_dir.as_path();
    fs::create_dir_all(out_dir).map_err(|source| PwaWriteError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let written = vec![
        write_file(out_dir, MANIFEST_FILE, &artifacts.manifest_json)?,
        write_file(out_dir, SW_CONFIG_FILE, &artifacts.sw_config_json)?,
    ];
    info!(out_dir = %out_dir.display(), "pwa artifacts written");
    Ok(written)
}

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, PwaWriteError> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|source| PwaWriteError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

//! The discovery file: how the per-event dispatcher finds the server.
//!
//! Holds `{port, token, updatedAt}`. Written atomically with owner-only
//! permissions on startup and removed on shutdown.

use std::io::Write;
use std::path::Path;

use tether_types::DiscoveryInfo;
use tracing::debug;

use crate::error::{Result, ServerError};

/// Write the discovery file through a temp file and a rename.
pub fn write_discovery(path: &Path, info: &DiscoveryInfo) -> Result<()> {
    let io_err = |source| ServerError::Discovery {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_vec_pretty(info).map_err(|e| ServerError::InvalidDiscovery {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
    let result = create_private(&tmp)
        .and_then(|mut f| {
            f.write_all(&json)?;
            f.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp, path));

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result.map_err(io_err)?;

    debug!(path = %path.display(), port = info.port, "Discovery file written");
    Ok(())
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::File::create(path)
}

/// Read and decode the discovery file.
pub fn read_discovery(path: &Path) -> Result<DiscoveryInfo> {
    let contents = std::fs::read_to_string(path).map_err(|e| ServerError::Discovery {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| ServerError::InvalidDiscovery {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Remove the discovery file. A missing file is not an error.
pub fn remove_discovery(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Discovery file removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ServerError::Discovery {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

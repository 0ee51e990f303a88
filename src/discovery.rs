//! Locate the freshly installed root filesystem
//!
//! Candidates are checked in priority order for a marker directory. When
//! none matches, the configured fallback device is mounted and checked once
//! more.

use converge::Host;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::InstallConfig;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no installed system found (checked {} for '{marker}')", join(.candidates))]
    NotFound {
        candidates: Vec<PathBuf>,
        marker: String,
    },

    #[error("fallback mount of {device} on {} failed: {message}", .mountpoint.display())]
    MountFailed {
        device: String,
        mountpoint: PathBuf,
        message: String,
    },

    #[error("mounted {device} on {} but it has no '{marker}' directory", .mountpoint.display())]
    MarkerMissing {
        device: String,
        mountpoint: PathBuf,
        marker: String,
    },
}

fn join(paths: &[PathBuf]) -> String {
    let shown: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    shown.join(", ")
}

impl DiscoveryError {
    /// What the operator can do by hand
    pub fn recovery(&self) -> Vec<String> {
        let mut steps = match self {
            Self::NotFound { .. } => vec![
                "Find the new root partition: lsblk -f".to_string(),
                "Mount it: mount /dev/<root-partition> /mnt".to_string(),
                "Or set [install.fallback] device in archup.toml".to_string(),
            ],
            Self::MountFailed { device, .. } => vec![
                format!("Check that {device} exists: lsblk -f"),
                "Mount the new root by hand: mount /dev/<root-partition> /mnt".to_string(),
            ],
            Self::MarkerMissing { mountpoint, .. } => vec![
                format!(
                    "{} is not the root partition; unmount it: umount {}",
                    mountpoint.display(),
                    mountpoint.display()
                ),
                "Mount the correct partition: mount /dev/<root-partition> /mnt".to_string(),
            ],
        };
        steps.push(
            "Then run `archup install` again (archinstall is skipped once the target is found)"
                .to_string(),
        );
        steps
    }
}

/// First candidate that contains the marker directory
pub fn find_target(host: &dyn Host, candidates: &[PathBuf], marker: &str) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|c| host.is_dir(&c.join(marker)))
        .cloned()
}

/// Find the target root, mounting the fallback device if needed
///
/// With `allow_mount` false (dry runs, status) the fallback is reported as
/// not found instead of being mounted.
pub fn discover_target_root(
    host: &dyn Host,
    install: &InstallConfig,
    allow_mount: bool,
) -> Result<PathBuf, DiscoveryError> {
    let candidates = install.candidate_paths();
    if let Some(root) = find_target(host, &candidates, &install.marker) {
        log::info!("Found installed system at {}", root.display());
        return Ok(root);
    }

    let not_found = DiscoveryError::NotFound {
        candidates,
        marker: install.marker.clone(),
    };
    let fallback = &install.fallback;
    if !allow_mount || !fallback.is_enabled() {
        return Err(not_found);
    }

    let mountpoint = PathBuf::from(&fallback.mountpoint);
    log::warn!(
        "No candidate matched, mounting {} on {}",
        fallback.device,
        mountpoint.display()
    );
    mount(host, &fallback.device, &mountpoint)?;

    if host.is_dir(&mountpoint.join(&install.marker)) {
        Ok(mountpoint)
    } else {
        Err(DiscoveryError::MarkerMissing {
            device: fallback.device.clone(),
            mountpoint,
            marker: install.marker.clone(),
        })
    }
}

fn mount(host: &dyn Host, device: &str, mountpoint: &Path) -> Result<(), DiscoveryError> {
    let failed = |message: String| DiscoveryError::MountFailed {
        device: device.to_string(),
        mountpoint: mountpoint.to_path_buf(),
        message,
    };

    host.create_dir_all(mountpoint)
        .map_err(|e| failed(format!("{e:#}")))?;
    let target = mountpoint.to_string_lossy();
    let output = host
        .run("mount", &[device, &target])
        .map_err(|e| failed(format!("{e:#}")))?;
    if output.success {
        Ok(())
    } else {
        Err(failed(output.error_text()))
    }
}

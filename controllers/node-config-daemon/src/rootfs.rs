//! Host root filesystem transition.
//!
//! The daemon runs in a container with the host's root filesystem mounted at
//! the root prefix. Before reconciliation starts it chroots into that mount so
//! every later file operation lands on the host. The steps run in a fixed
//! order and stop at the first failure:
//!
//! 1. verify the mount path exists and is a directory
//! 2. chroot into it
//! 3. chdir to `/` inside the new root, otherwise the working directory
//!    still points into the old namespace
//! 4. clear the root prefix, so paths are no longer double-prefixed
//!
//! Step 4 is expressed by consuming the [`BootstrapConfig`] and returning an
//! [`EngineConfig`]; the pre-transition prefix is unreachable afterwards.

use crate::config::{BootstrapConfig, EngineConfig};
use crate::error::RootError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

/// The two privileged syscalls behind the transition.
pub trait RootOps {
    /// Changes the process root directory.
    fn change_root(&self, path: &Path) -> nix::Result<()>;

    /// Changes the process working directory.
    fn change_dir(&self, path: &Path) -> nix::Result<()>;
}

/// [`RootOps`] backed by chroot(2) and chdir(2). Requires `CAP_SYS_CHROOT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Syscalls;

impl RootOps for Syscalls {
    fn change_root(&self, path: &Path) -> nix::Result<()> {
        nix::unistd::chroot(path)
    }

    fn change_dir(&self, path: &Path) -> nix::Result<()> {
        nix::unistd::chdir(path)
    }
}

/// Checks that the host root is mounted at `path`.
pub fn verify_mount(path: &Path) -> Result<(), RootError> {
    let metadata = std::fs::metadata(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            RootError::NotFound { path: path.to_path_buf() }
        } else {
            RootError::Stat { path: path.to_path_buf(), source }
        }
    })?;

    if !metadata.is_dir() {
        return Err(RootError::NotADirectory { path: path.to_path_buf() });
    }
    Ok(())
}

/// Moves the process into the host root and returns the engine's view of
/// the configuration.
pub fn transition<R: RootOps>(ops: &R, config: BootstrapConfig) -> Result<EngineConfig, RootError> {
    let mount = config.root_prefix();
    verify_mount(mount)?;

    info!(root_prefix = %mount.display(), "chrooting into root prefix {}", mount.display());
    ops.change_root(mount).map_err(|source| RootError::Chroot {
        path: mount.to_path_buf(),
        source,
    })?;

    let new_root = Path::new("/");
    info!("moving to / inside the chroot");
    ops.change_dir(new_root).map_err(|source| RootError::Chdir {
        path: new_root.to_path_buf(),
        source,
    })?;

    Ok(config.into_rooted())
}

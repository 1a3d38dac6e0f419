//! Bind mount filtering

use std::path::Path;

use tracing::debug;

use crate::template::BindMount;

/// Answers whether a host path exists
pub trait FileProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Probe against the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileProbe;

impl FileProbe for LocalFileProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

impl<F> FileProbe for F
where
    F: Fn(&Path) -> bool,
{
    fn exists(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Keep only the mounts whose host path exists
pub fn filter_bind_mounts(mounts: Vec<BindMount>, probe: &dyn FileProbe) -> Vec<BindMount> {
    mounts
        .into_iter()
        .filter(|mount| {
            let exists = probe.exists(Path::new(&mount.host));
            if !exists {
                debug!(host = %mount.host, "dropping bind mount with missing host path");
            }
            exists
        })
        .collect()
}

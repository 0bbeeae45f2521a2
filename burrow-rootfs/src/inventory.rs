//! Container inventory: one directory per container under the containers root

use std::path::Path;
use std::time::SystemTime;
use tokio::fs;
use tracing::warn;

use burrow_core::Result;

/// A container root found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Directory name, which is the container ID
    pub name: String,

    /// Last modification time of the directory
    pub modified: SystemTime,
}

/// List container directories directly below `containers_root`, sorted by name
///
/// Plain files are ignored. Entries whose metadata cannot be read are skipped
/// with a warning.
pub async fn list_containers(containers_root: &Path) -> Result<Vec<ContainerEntry>> {
    let mut entries = fs::read_dir(containers_root).await?;
    let mut containers = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(container = %name, error = %e, "Could not read container info");
                continue;
            }
        };

        if !metadata.is_dir() {
            continue;
        }

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!(container = %name, error = %e, "Could not read container timestamp");
                continue;
            }
        };

        containers.push(ContainerEntry { name, modified });
    }

    containers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(containers)
}

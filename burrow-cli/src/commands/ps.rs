//! Ps command implementation

use anyhow::{Context, Result};
use burrow_core::RuntimeConfig;
use burrow_rootfs::list_containers;
use chrono::{DateTime, Local};
use std::time::SystemTime;

pub async fn execute(config: &RuntimeConfig) -> Result<i32> {
    let containers = list_containers(&config.containers_root)
        .await
        .with_context(|| {
            format!(
                "Failed to read containers root {}",
                config.containers_root.display()
            )
        })?;

    if containers.is_empty() {
        println!("No containers found.");
        return Ok(0);
    }

    for container in &containers {
        println!("{}\t{}", container.name, format_timestamp(container.modified));
    }

    Ok(0)
}

/// Format like `date(1)`, with the UTC offset in place of the zone name
fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%a %b %e %H:%M:%S %:z %Y")
        .to_string()
}

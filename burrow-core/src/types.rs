//! Core type definitions with strong typing and validation

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result};

/// Container identifier with validation
///
/// Doubles as the container's hostname, so it is bounded by the kernel's
/// hostname length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Maximum length for container IDs
    pub const MAX_LENGTH: usize = 64;

    /// Prefix of generated IDs
    pub const PREFIX: &'static str = "container-";

    /// Number of random characters in a generated ID
    pub const RANDOM_LENGTH: usize = 24;

    /// Create a new `ContainerId` with validation
    ///
    /// # Errors
    /// Returns error if ID is invalid (empty, too long, or contains invalid characters)
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random identifier (`container-` + 24 alphanumerics)
    #[must_use]
    pub fn generate() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(Self::RANDOM_LENGTH)
            .map(char::from)
            .collect();

        Self(format!("{}{suffix}", Self::PREFIX))
    }

    /// Validate a container ID
    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::config("Container ID cannot be empty"));
        }

        if id.len() > Self::MAX_LENGTH {
            return Err(Error::config(format!(
                "Container ID too long (max {} chars)",
                Self::MAX_LENGTH
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::config(
                "Container ID can only contain alphanumeric, dash, and underscore",
            ));
        }

        Ok(())
    }

    /// Get the container ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        #[allow(clippy::cast_possible_wrap)]
        Self(std::process::id() as i32)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

/// A `host:container` bind mapping
///
/// The container side is always interpreted relative to the container root,
/// with or without a leading `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VolumeMapping {
    host: PathBuf,
    container: PathBuf,
}

impl VolumeMapping {
    /// Separator between host and container paths
    pub const SEPARATOR: char = ':';

    /// Create a mapping from its two halves
    ///
    /// # Errors
    /// Returns [`Error::InvalidVolume`] if either side is empty, the container
    /// side climbs out of the container root, or it names the root itself
    pub fn new(host: impl Into<PathBuf>, container: impl Into<PathBuf>) -> Result<Self> {
        let mapping = Self {
            host: host.into(),
            container: container.into(),
        };
        mapping.validate()?;
        Ok(mapping)
    }

    fn validate(&self) -> Result<()> {
        let reject = |reason: &str| {
            Err(Error::InvalidVolume {
                mapping: self.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.host.as_os_str().is_empty() {
            return reject("host path is empty");
        }
        if self.container.as_os_str().is_empty() {
            return reject("container path is empty");
        }
        if self
            .container
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return reject("container path may not contain '..'");
        }
        if self.relative_target().as_os_str().is_empty() {
            return reject("container path must name a directory below the container root");
        }

        Ok(())
    }

    /// Host directory to bind
    #[must_use]
    pub fn host(&self) -> &Path {
        &self.host
    }

    /// Container path as given
    #[must_use]
    pub fn container(&self) -> &Path {
        &self.container
    }

    /// Container path with root and `.` components stripped, ready to be
    /// joined onto a container root
    #[must_use]
    pub fn relative_target(&self) -> PathBuf {
        self.container
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect()
    }

    /// Render as the `-v=host:container` argument understood by the CLI
    #[must_use]
    pub fn to_arg(&self) -> String {
        format!("-v={self}")
    }
}

impl fmt::Display for VolumeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.host.display(),
            Self::SEPARATOR,
            self.container.display()
        )
    }
}

impl FromStr for VolumeMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(Self::SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(container), None) => Self::new(host, container),
            _ => Err(Error::InvalidVolume {
                mapping: s.to_string(),
                reason: "expected exactly one ':' (host:container)".to_string(),
            }),
        }
    }
}

impl TryFrom<String> for VolumeMapping {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<VolumeMapping> for String {
    fn from(mapping: VolumeMapping) -> Self {
        mapping.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_validation() {
        assert!(ContainerId::new("valid-id_123").is_ok());
        assert!(ContainerId::new("").is_err());
        assert!(ContainerId::new("a".repeat(65)).is_err());
        assert!(ContainerId::new("invalid id").is_err());
        assert!(ContainerId::new("invalid/id").is_err());
    }

    #[test]
    fn test_generated_ids_are_valid_and_distinct() {
        let a = ContainerId::generate();
        let b = ContainerId::generate();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with(ContainerId::PREFIX));
        assert_eq!(
            a.as_str().len(),
            ContainerId::PREFIX.len() + ContainerId::RANDOM_LENGTH
        );
        assert!(ContainerId::new(a.as_str()).is_ok());
    }

    #[test]
    fn test_volume_mapping_parse() {
        let mapping: VolumeMapping = "/srv/data:/data".parse().unwrap();
        assert_eq!(mapping.host(), Path::new("/srv/data"));
        assert_eq!(mapping.container(), Path::new("/data"));
        assert_eq!(mapping.relative_target(), PathBuf::from("data"));
        assert_eq!(mapping.to_arg(), "-v=/srv/data:/data");
    }

    #[test]
    fn test_volume_mapping_rejects_bad_separators() {
        assert!("/srv/data".parse::<VolumeMapping>().is_err());
        assert!("/a:/b:/c".parse::<VolumeMapping>().is_err());
        assert!(":/data".parse::<VolumeMapping>().is_err());
        assert!("/srv:".parse::<VolumeMapping>().is_err());
    }

    #[test]
    fn test_volume_mapping_stays_inside_root() {
        assert!("/srv:/../etc".parse::<VolumeMapping>().is_err());
        assert!("/srv:/".parse::<VolumeMapping>().is_err());
        assert!("/srv:./.".parse::<VolumeMapping>().is_err());

        let nested: VolumeMapping = "/srv:./var/./lib".parse().unwrap();
        assert_eq!(nested.relative_target(), PathBuf::from("var/lib"));
    }

    #[test]
    fn test_process_id_display() {
        let pid = ProcessId::from(nix::unistd::Pid::from_raw(123));
        assert_eq!(pid.to_string(), "123");
        assert_eq!(ProcessId::current().to_string(), std::process::id().to_string());
    }
}

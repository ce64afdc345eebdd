use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Provider-assigned numeric droplet id.
///
/// The orchestration core stores it as a string; `Display`/`FromStr` are the
/// two directions of that mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DropletId(pub u64);

impl fmt::Display for DropletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DropletId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_string()))
    }
}

/// User-declared droplet attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DesiredSpec {
    pub name: String,
    pub size: String,
    /// Image slug, or a numeric image id for private images.
    pub image: String,
    pub region: String,
    #[serde(default)]
    pub ssh_keys: BTreeSet<u64>,
    #[serde(default)]
    pub backups_enabled: bool,
    #[serde(default)]
    pub ipv6_enabled: bool,
    #[serde(default)]
    pub private_networking: bool,
    #[serde(default)]
    pub user_data: Option<String>,
}

impl DesiredSpec {
    pub fn new(
        name: impl Into<String>,
        size: impl Into<String>,
        image: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            image: image.into(),
            region: region.into(),
            ..Default::default()
        }
    }
}

/// Provider-reported droplet status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropletStatus {
    New,
    Active,
    Off,
    Archive,
    Unknown,
}

impl DropletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Active => "active",
            Self::Off => "off",
            Self::Archive => "archive",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DropletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-side truth about a droplet, as last retrieved.
///
/// Mid-provisioning snapshots are routinely partial: no addresses yet, or no
/// image slug for private images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub id: DropletId,
    pub status: DropletStatus,
    pub name: String,
    pub size_slug: String,
    pub image_slug: Option<String>,
    pub image_id: Option<u64>,
    pub region_slug: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub public_ipv6: Option<String>,
    /// An operation is in progress on the provider side.
    pub locked: bool,
}

impl RemoteResource {
    /// Whether the droplet runs the given image, referenced by slug or id.
    pub fn runs_image(&self, image: &str) -> bool {
        self.image_slug.as_deref() == Some(image)
            || self.image_id.is_some_and(|id| id.to_string() == image)
    }

    pub fn is_settled_in(&self, status: DropletStatus) -> bool {
        !self.locked && self.status == status
    }
}

/// A single mutating operation submitted through `ComputeClient::update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Rename { name: String },
    Resize { size: String },
    Rebuild { image: String },
    PowerOff,
    PowerOn,
}

impl Change {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rename { .. } => "rename",
            Self::Resize { .. } => "resize",
            Self::Rebuild { .. } => "rebuild",
            Self::PowerOff => "power_off",
            Self::PowerOn => "power_on",
        }
    }
}

/// Provider handle on a submitted [`Change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider-side progress of a submitted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    InProgress,
    Completed,
    /// The provider gave up; the droplet keeps its previous attributes.
    Errored,
}

//! Projection of a [`RemoteResource`] into the flat attribute map the
//! orchestration core persists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::RemoteResource;

pub const ID: &str = "id";
pub const NAME: &str = "name";
pub const SIZE: &str = "size";
pub const IMAGE: &str = "image";
pub const REGION: &str = "region";
pub const STATUS: &str = "status";
pub const LOCKED: &str = "locked";
pub const IPV4_ADDRESS: &str = "ipv4_address";
pub const IPV4_ADDRESS_PRIVATE: &str = "ipv4_address_private";
pub const IPV6_ADDRESS: &str = "ipv6_address";

/// Every key a projected state carries, present or not on the remote side.
pub const KEYS: [&str; 10] = [
    ID,
    NAME,
    SIZE,
    IMAGE,
    REGION,
    STATUS,
    LOCKED,
    IPV4_ADDRESS,
    IPV4_ADDRESS_PRIVATE,
    IPV6_ADDRESS,
];

/// Last-known-good droplet attributes, keyed by attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalState(BTreeMap<String, String>);

impl CanonicalState {
    /// Wrap attributes handed back by the orchestration core.
    pub fn from_attributes(attributes: BTreeMap<String, String>) -> Self {
        Self(attributes)
    }

    /// Attribute value, or `""` when the key is unknown.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn id(&self) -> &str {
        self.get(ID)
    }

    pub fn name(&self) -> &str {
        self.get(NAME)
    }

    pub fn size(&self) -> &str {
        self.get(SIZE)
    }

    pub fn image(&self) -> &str {
        self.get(IMAGE)
    }

    pub fn region(&self) -> &str {
        self.get(REGION)
    }

    pub fn status(&self) -> &str {
        self.get(STATUS)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_attributes(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// Project a remote snapshot. Absent values become `""` so the key set never
/// changes between refreshes.
pub fn project(resource: &RemoteResource) -> CanonicalState {
    let image = match (&resource.image_slug, resource.image_id) {
        (Some(slug), _) if !slug.is_empty() => slug.clone(),
        (_, Some(id)) => id.to_string(),
        _ => String::new(),
    };

    let attributes = [
        (ID, resource.id.to_string()),
        (NAME, resource.name.clone()),
        (SIZE, resource.size_slug.clone()),
        (IMAGE, image),
        (REGION, resource.region_slug.clone()),
        (STATUS, resource.status.to_string()),
        (LOCKED, resource.locked.to_string()),
        (IPV4_ADDRESS, resource.public_ip.clone().unwrap_or_default()),
        (
            IPV4_ADDRESS_PRIVATE,
            resource.private_ip.clone().unwrap_or_default(),
        ),
        (IPV6_ADDRESS, resource.public_ipv6.clone().unwrap_or_default()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    CanonicalState(attributes)
}

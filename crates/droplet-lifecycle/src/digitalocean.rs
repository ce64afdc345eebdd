use async_trait::async_trait;
use do_api::{CreateDropletRequest, Droplet, DropletAction, DropletsClient, ImageRef, NetworkType};
use tracing::{debug, info};

use crate::classify::ClientError;
use crate::types::{
    ActionId, ActionStatus, Change, DesiredSpec, DropletId, DropletStatus, RemoteResource,
};
use crate::{ClientResult, ComputeClient, Error, Result};

/// DigitalOcean v2 API behind the [`ComputeClient`] seam.
///
/// Delegates to `do_api::DropletsClient` for all HTTP calls.
pub struct DigitalOceanClient {
    client: DropletsClient,
}

impl DigitalOceanClient {
    pub fn new(client: DropletsClient) -> Self {
        Self { client }
    }

    /// The underlying HTTP client, for checks outside the lifecycle.
    pub fn api(&self) -> &DropletsClient {
        &self.client
    }

    /// Create from env vars: `DIGITALOCEAN_TOKEN` (required) and
    /// `DIGITALOCEAN_API_URL` (optional, defaults to the public API).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let token = std::env::var("DIGITALOCEAN_TOKEN")
            .map_err(|_| Error::MissingEnv("DIGITALOCEAN_TOKEN".into()))?;

        let client = match std::env::var("DIGITALOCEAN_API_URL") {
            Ok(url) => DropletsClient::with_base_url(token, url),
            Err(_) => DropletsClient::new(token),
        };

        Ok(Self { client })
    }

    fn parse_status(status: do_api::DropletStatus) -> DropletStatus {
        match status {
            do_api::DropletStatus::New => DropletStatus::New,
            do_api::DropletStatus::Active => DropletStatus::Active,
            do_api::DropletStatus::Off => DropletStatus::Off,
            do_api::DropletStatus::Archive => DropletStatus::Archive,
            do_api::DropletStatus::Unknown => DropletStatus::Unknown,
        }
    }

    fn parse_action_status(status: do_api::ActionStatus) -> ActionStatus {
        match status {
            do_api::ActionStatus::InProgress => ActionStatus::InProgress,
            do_api::ActionStatus::Completed => ActionStatus::Completed,
            do_api::ActionStatus::Errored => ActionStatus::Errored,
        }
    }

    fn resource(droplet: &Droplet) -> RemoteResource {
        RemoteResource {
            id: DropletId(droplet.id),
            status: Self::parse_status(droplet.status),
            name: droplet.name.clone(),
            size_slug: droplet.size_slug.clone(),
            image_slug: droplet.image.as_ref().and_then(|i| i.slug.clone()),
            image_id: droplet.image.as_ref().and_then(|i| i.id),
            region_slug: droplet
                .region
                .as_ref()
                .map(|r| r.slug.clone())
                .unwrap_or_default(),
            public_ip: droplet.ipv4(NetworkType::Public).map(str::to_string),
            private_ip: droplet.ipv4(NetworkType::Private).map(str::to_string),
            public_ipv6: droplet.ipv6(NetworkType::Public).map(str::to_string),
            locked: droplet.locked,
        }
    }

    fn action(change: &Change) -> DropletAction {
        match change {
            Change::Rename { name } => DropletAction::Rename { name: name.clone() },
            // CPU/RAM only; the disk stays as is so the droplet can shrink again.
            Change::Resize { size } => DropletAction::Resize {
                size: size.clone(),
                disk: false,
            },
            Change::Rebuild { image } => DropletAction::Rebuild {
                image: ImageRef::from(image.as_str()),
            },
            Change::PowerOff => DropletAction::PowerOff,
            Change::PowerOn => DropletAction::PowerOn,
        }
    }
}

impl From<do_api::Error> for ClientError {
    fn from(err: do_api::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl ComputeClient for DigitalOceanClient {
    async fn create(&self, spec: &DesiredSpec) -> ClientResult<RemoteResource> {
        let droplet = self
            .client
            .create_droplet(&CreateDropletRequest {
                name: spec.name.clone(),
                region: spec.region.clone(),
                size: spec.size.clone(),
                image: ImageRef::from(spec.image.as_str()),
                ssh_keys: spec.ssh_keys.iter().copied().collect(),
                backups: spec.backups_enabled,
                ipv6: spec.ipv6_enabled,
                private_networking: spec.private_networking,
                user_data: spec.user_data.clone(),
            })
            .await?;

        info!(droplet_id = droplet.id, "digitalocean: droplet submitted");
        Ok(Self::resource(&droplet))
    }

    async fn retrieve(&self, id: DropletId) -> ClientResult<RemoteResource> {
        let droplet = self.client.get_droplet(id.0).await?;
        Ok(Self::resource(&droplet))
    }

    async fn update(&self, id: DropletId, change: &Change) -> ClientResult<ActionId> {
        let action = self.client.droplet_action(id.0, &Self::action(change)).await?;
        debug!(droplet_id = %id, action_id = action.id, kind = %action.kind, "digitalocean: action submitted");
        Ok(ActionId(action.id))
    }

    async fn action_status(&self, action: ActionId) -> ClientResult<ActionStatus> {
        let action = self.client.get_action(action.0).await?;
        Ok(Self::parse_action_status(action.status))
    }

    async fn destroy(&self, id: DropletId) -> ClientResult<()> {
        self.client.delete_droplet(id.0).await?;
        info!(droplet_id = %id, "digitalocean: destroy submitted");
        Ok(())
    }
}

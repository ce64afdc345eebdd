//! Scripted in-memory provider for driving the lifecycle manager.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use droplet_lifecycle::{
    ActionId, ActionStatus, Change, ClientError, ClientResult, ComputeClient, DesiredSpec,
    DropletId, DropletStatus, LifecycleConfig, LifecycleManager, PollConfig, RemoteResource,
};

pub const SIZES: [&str; 4] = ["512mb", "1gb", "2gb", "4gb"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Retrieve(u64),
    Update(u64, Change),
    ActionStatus(u64),
    Destroy(u64),
}

/// Provider call that never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hang {
    Create,
    Retrieve,
    Destroy,
}

enum Pending {
    Apply(Change, u64),
    Activate,
    Unlock,
    Remove,
}

struct Droplet {
    resource: RemoteResource,
    pending: Option<(Pending, u32)>,
    /// Reads answering 404 before the droplet becomes visible.
    hidden_reads: u32,
}

#[derive(Default)]
pub(crate) struct Inner {
    next_id: u64,
    next_action: u64,
    droplets: HashMap<u64, Droplet>,
    actions: HashMap<u64, ActionStatus>,
    retrieve_faults: VecDeque<ClientError>,
    calls: Vec<Call>,
    observed: Vec<RemoteResource>,
}

/// Provider double with asynchronous operations.
///
/// Every operation locks the droplet and takes effect after `settle_reads`
/// retrieves; resizes are refused unless the droplet is off.
pub struct FakeCompute {
    pub(crate) inner: Mutex<Inner>,
    pub settle_reads: u32,
    pub hidden_reads: u32,
    /// Size reported while a resize is in flight, to simulate a misbehaving API.
    pub resize_through: Option<String>,
    /// Never finish provisioning or destruction.
    pub stuck: bool,
    /// Power on automatically after a rebuild completes.
    pub boot_after_rebuild: bool,
    /// Reads after provisioning that still report the droplet locked.
    pub lock_after_active: u32,
    /// Change whose action errors out, leaving the droplet as it was.
    pub errored_change: Option<&'static str>,
    /// Change that never finishes.
    pub stalled_change: Option<&'static str>,
    pub hang: Option<Hang>,
}

impl Default for FakeCompute {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 3164444,
                next_action: 36804636,
                ..Default::default()
            }),
            settle_reads: 2,
            hidden_reads: 0,
            resize_through: None,
            stuck: false,
            boot_after_rebuild: false,
            lock_after_active: 0,
            errored_change: None,
            stalled_change: None,
            hang: None,
        }
    }
}

impl FakeCompute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_retrieve(&self, err: ClientError) {
        self.inner.lock().unwrap().retrieve_faults.push_back(err);
    }

    fn record(&self, call: Call) {
        self.inner.lock().unwrap().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Change> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update(_, change) => Some(change),
                _ => None,
            })
            .collect()
    }

    pub fn retrieves(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Retrieve(_)))
            .count()
    }

    pub fn action_checks(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::ActionStatus(_)))
            .count()
    }

    /// Every snapshot handed out by `retrieve`, in order.
    pub fn observed(&self) -> Vec<RemoteResource> {
        self.inner.lock().unwrap().observed.clone()
    }

    pub fn remote(&self, id: u64) -> Option<RemoteResource> {
        self.inner
            .lock()
            .unwrap()
            .droplets
            .get(&id)
            .map(|d| d.resource.clone())
    }

    /// Drop the droplet without going through `destroy`.
    pub fn vanish(&self, id: DropletId) {
        self.inner.lock().unwrap().droplets.remove(&id.0);
    }

    /// Keep the droplet locked for the next `reads` retrieves.
    pub fn hold_lock(&self, id: DropletId, reads: u32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(droplet) = inner.droplets.get_mut(&id.0) {
            droplet.resource.locked = true;
            droplet.pending = Some((Pending::Unlock, reads));
        }
    }

    /// Seed an active droplet, bypassing the create flow.
    pub fn insert_active(&self, spec: &DesiredSpec) -> DropletId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        let mut resource = Self::fresh(id, spec);
        Self::activate(&mut resource);
        inner.droplets.insert(
            id,
            Droplet {
                resource,
                pending: None,
                hidden_reads: 0,
            },
        );
        DropletId(id)
    }

    fn fresh(id: u64, spec: &DesiredSpec) -> RemoteResource {
        RemoteResource {
            id: DropletId(id),
            status: DropletStatus::New,
            name: spec.name.clone(),
            size_slug: spec.size.clone(),
            image_slug: Some(spec.image.clone()),
            image_id: Some(6372321),
            region_slug: spec.region.clone(),
            public_ip: None,
            private_ip: None,
            public_ipv6: None,
            locked: true,
        }
    }

    fn activate(resource: &mut RemoteResource) {
        resource.status = DropletStatus::Active;
        resource.locked = false;
        resource.public_ip = Some("104.131.186.241".into());
        resource.private_ip = Some("10.128.0.7".into());
    }

    fn apply(&self, resource: &mut RemoteResource, change: &Change) {
        match change {
            Change::Rename { name } => resource.name = name.clone(),
            Change::Resize { size } => resource.size_slug = size.clone(),
            Change::Rebuild { image } => {
                resource.image_slug = Some(image.clone());
                if self.boot_after_rebuild {
                    resource.status = DropletStatus::Active;
                }
            }
            Change::PowerOff => resource.status = DropletStatus::Off,
            Change::PowerOn => resource.status = DropletStatus::Active,
        }
        resource.locked = false;
    }

    fn busy(id: u64) -> ClientError {
        ClientError::http(422, format!("droplet {id} already has a pending event"))
    }

    fn not_found() -> ClientError {
        ClientError::http(404, "The resource you were accessing could not be found.")
    }
}

#[async_trait]
impl ComputeClient for FakeCompute {
    async fn create(&self, spec: &DesiredSpec) -> ClientResult<RemoteResource> {
        self.record(Call::Create(spec.name.clone()));
        if self.hang == Some(Hang::Create) {
            return std::future::pending().await;
        }

        if !SIZES.contains(&spec.size.as_str()) {
            return Err(ClientError::http(422, "You specified an invalid size"));
        }

        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        let resource = Self::fresh(id, spec);
        inner.droplets.insert(
            id,
            Droplet {
                resource: resource.clone(),
                pending: Some((Pending::Activate, self.settle_reads)),
                hidden_reads: self.hidden_reads,
            },
        );
        Ok(resource)
    }

    async fn retrieve(&self, id: DropletId) -> ClientResult<RemoteResource> {
        self.record(Call::Retrieve(id.0));
        if self.hang == Some(Hang::Retrieve) {
            return std::future::pending().await;
        }

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        if let Some(err) = inner.retrieve_faults.pop_front() {
            return Err(err);
        }

        let Some(droplet) = inner.droplets.get_mut(&id.0) else {
            return Err(Self::not_found());
        };

        if droplet.hidden_reads > 0 {
            droplet.hidden_reads -= 1;
            return Err(Self::not_found());
        }

        let stalled = matches!(
            &droplet.pending,
            Some((Pending::Apply(change, _), _)) if Some(change.label()) == self.stalled_change
        );

        let mut removed = false;
        if !self.stuck
            && !stalled
            && let Some((_, remaining)) = droplet.pending.as_mut()
        {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0
                && let Some((pending, _)) = droplet.pending.take()
            {
                match pending {
                    Pending::Activate => {
                        Self::activate(&mut droplet.resource);
                        if self.lock_after_active > 0 {
                            droplet.resource.locked = true;
                            droplet.pending = Some((Pending::Unlock, self.lock_after_active));
                        }
                    }
                    Pending::Unlock => droplet.resource.locked = false,
                    Pending::Apply(change, action) => {
                        let status = if Some(change.label()) == self.errored_change {
                            droplet.resource.locked = false;
                            ActionStatus::Errored
                        } else {
                            self.apply(&mut droplet.resource, &change);
                            ActionStatus::Completed
                        };
                        inner.actions.insert(action, status);
                    }
                    Pending::Remove => removed = true,
                }
            }
        }

        if removed {
            inner.droplets.remove(&id.0);
            return Err(Self::not_found());
        }

        let snapshot = droplet.resource.clone();
        inner.observed.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn update(&self, id: DropletId, change: &Change) -> ClientResult<ActionId> {
        self.record(Call::Update(id.0, change.clone()));

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let droplet = inner.droplets.get_mut(&id.0).ok_or_else(Self::not_found)?;
        if droplet.resource.locked {
            return Err(Self::busy(id.0));
        }
        if let Change::Resize { size } = change {
            if droplet.resource.status != DropletStatus::Off {
                return Err(ClientError::http(
                    422,
                    "droplet must be powered off before resizing",
                ));
            }
            if !SIZES.contains(&size.as_str()) {
                return Err(ClientError::http(422, "You specified an invalid size"));
            }
            if let Some(phantom) = &self.resize_through {
                droplet.resource.size_slug = phantom.clone();
            }
        }

        let action = inner.next_action;
        inner.next_action += 1;
        droplet.resource.locked = true;
        droplet.pending = Some((Pending::Apply(change.clone(), action), self.settle_reads));
        inner.actions.insert(action, ActionStatus::InProgress);
        Ok(ActionId(action))
    }

    async fn action_status(&self, action: ActionId) -> ClientResult<ActionStatus> {
        self.record(Call::ActionStatus(action.0));
        let inner = self.inner.lock().unwrap();
        inner
            .actions
            .get(&action.0)
            .copied()
            .ok_or_else(Self::not_found)
    }

    async fn destroy(&self, id: DropletId) -> ClientResult<()> {
        self.record(Call::Destroy(id.0));
        if self.hang == Some(Hang::Destroy) {
            return std::future::pending().await;
        }

        let mut inner = self.inner.lock().unwrap();
        let droplet = inner.droplets.get_mut(&id.0).ok_or_else(Self::not_found)?;
        droplet.resource.locked = true;
        droplet.pending = Some((Pending::Remove, self.settle_reads));
        Ok(())
    }
}

pub fn spec_foo() -> DesiredSpec {
    DesiredSpec::new("foo", "512mb", "centos-5-8-x32", "nyc2")
}

pub fn spec_baz() -> DesiredSpec {
    DesiredSpec::new("baz", "1gb", "centos-5-8-x32", "nyc2")
}

pub fn test_config() -> LifecycleConfig {
    LifecycleConfig {
        create_timeout: Duration::from_secs(120),
        update_timeout: Duration::from_secs(120),
        delete_timeout: Duration::from_secs(60),
        read_timeout: Duration::from_secs(10),
        poll: PollConfig {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(4),
            multiplier: 2.0,
            jitter: false,
        },
    }
}

pub fn manager(fake: &Arc<FakeCompute>) -> LifecycleManager {
    LifecycleManager::new(fake.clone(), test_config())
}

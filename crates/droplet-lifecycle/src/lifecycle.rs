//! Create/Read/Update/Delete/Exists for one droplet.
//!
//! ```text
//! absent -> creating -> active -> {updating -> active}* -> deleting -> absent
//! ```
//!
//! Every transition is confirmed by a read; an accepted request alone never
//! counts as success.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::LifecycleConfig;
use crate::plan::{is_settled, plan_update};
use crate::poll::{self, Observation, PollContext, PollError};
use crate::state::{CanonicalState, project};
use crate::types::{Change, DesiredSpec, DropletId, DropletStatus, RemoteResource};
use crate::{ClientResult, ComputeClient, Error, Result};

/// Result of reading a droplet that may not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(CanonicalState),
    NotFound,
}

/// Drives one droplet through its lifecycle.
///
/// Holds no per-resource state: the client and configuration are shared,
/// and everything else arrives as arguments. Callers must not run two
/// operations against the same droplet at once.
#[derive(Clone)]
pub struct LifecycleManager {
    client: Arc<dyn ComputeClient>,
    config: LifecycleConfig,
    cancel: CancellationToken,
}

impl LifecycleManager {
    pub fn new(client: Arc<dyn ComputeClient>, config: LifecycleConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight operations when `cancel` fires. Aborted operations
    /// return [`Error::Timeout`].
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    // ── Create ──────────────────────────────────────────────────────

    pub async fn create(&self, spec: &DesiredSpec) -> Result<CanonicalState> {
        let deadline = self.deadline(self.config.create_timeout);

        info!(
            name = %spec.name,
            size = %spec.size,
            image = %spec.image,
            region = %spec.region,
            "submitting droplet creation"
        );

        let created = self
            .bounded(deadline, "create", None, self.client.create(spec))
            .await?;
        let id = created.id;

        info!(droplet_id = %id, status = %created.status, "droplet created, waiting for active");

        let ctx = self.poll_context(deadline);
        poll::wait_for_visible(&*self.client, id, &ctx, "active", |r| {
            Ok(r.is_settled_in(DropletStatus::Active))
        })
        .await
        .map_err(|e| match e {
            PollError::TimedOut { last } => Error::ProvisionTimeout {
                id,
                last_status: describe(last.as_ref()),
            },
            PollError::Cancelled { .. } => Error::Timeout {
                operation: "create",
                id: Some(id),
            },
            PollError::Failed(err) => err,
        })?;

        info!(droplet_id = %id, "droplet active");

        self.refresh(id, deadline, "create", None).await
    }

    // ── Read / Exists ───────────────────────────────────────────────

    /// A 404 is the expected answer for a destroyed droplet and comes back
    /// as [`ReadOutcome::NotFound`], not as an error.
    pub async fn read(&self, id: &str) -> Result<ReadOutcome> {
        let id: DropletId = id.parse()?;
        let deadline = self.deadline(self.config.read_timeout);

        match self
            .bounded(deadline, "read", Some(id), self.client.retrieve(id))
            .await
        {
            Ok(resource) => Ok(ReadOutcome::Found(project(&resource))),
            Err(Error::NotFound(_)) => {
                info!(droplet_id = %id, "droplet not found");
                Ok(ReadOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let wanted: DropletId = id.parse()?;
        Ok(match self.read(id).await? {
            ReadOutcome::Found(state) => state.id() == wanted.to_string(),
            ReadOutcome::NotFound => false,
        })
    }

    // ── Update ──────────────────────────────────────────────────────

    /// Apply the difference between `old` and `new`, one confirmed step at
    /// a time. The provider rejects mutations on a locked droplet, so each
    /// step is polled to completion before the next is submitted.
    pub async fn update(
        &self,
        id: &str,
        old: &DesiredSpec,
        new: &DesiredSpec,
    ) -> Result<CanonicalState> {
        let id: DropletId = id.parse()?;
        let steps = plan_update(old, new)?;
        let deadline = self.deadline(self.config.update_timeout);

        let mut current: Option<RemoteResource> = None;
        if steps.is_empty() {
            info!(droplet_id = %id, "no in-place changes");
        } else {
            // a droplet can report active while a provider event still holds it
            let ctx = self.poll_context(deadline);
            let unlocked = poll::wait_for(&*self.client, id, &ctx, "unlocked", |r| {
                check_size(r, &old.size, &new.size)?;
                Ok(!r.locked)
            })
            .await
            .map_err(|e| step_error(e, "update", id))?;
            current = Some(unlocked);
        }

        for step in &steps {
            if *step == Change::PowerOn
                && current
                    .as_ref()
                    .is_some_and(|r| r.is_settled_in(DropletStatus::Active))
            {
                info!(droplet_id = %id, "droplet already active, skipping power on");
                continue;
            }

            info!(droplet_id = %id, step = step.label(), "submitting change");
            let action = self
                .bounded(deadline, step.label(), Some(id), self.client.update(id, step))
                .await?;

            let ctx = self.poll_context(deadline);
            let settled =
                poll::wait_for_action(&*self.client, id, action, &ctx, step.label(), |r| {
                    check_size(r, &old.size, &new.size)?;
                    Ok(is_settled(step, r))
                })
                .await
                .map_err(|e| step_error(e, step.label(), id))?;

            info!(droplet_id = %id, step = step.label(), action_id = %action, status = %settled.status, "change settled");
            current = Some(settled);
        }

        self.refresh(id, deadline, "update", Some((old.size.as_str(), new.size.as_str())))
            .await
    }

    // ── Delete ──────────────────────────────────────────────────────

    /// Destroy and wait until reads report the droplet gone. A droplet that
    /// is already gone counts as deleted.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id: DropletId = id.parse()?;
        let deadline = self.deadline(self.config.delete_timeout);

        info!(droplet_id = %id, "destroying droplet");

        match self
            .bounded(deadline, "delete", Some(id), self.client.destroy(id))
            .await
        {
            Ok(()) => {}
            Err(Error::NotFound(_)) => {
                warn!(droplet_id = %id, "droplet already destroyed");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let ctx = self.poll_context(deadline);
        poll::wait_for_absent(&*self.client, id, &ctx)
            .await
            .map_err(|e| match e {
                PollError::TimedOut { .. } => Error::DestroyTimeout(id),
                PollError::Cancelled { .. } => Error::Timeout {
                    operation: "delete",
                    id: Some(id),
                },
                PollError::Failed(err) => err,
            })?;

        info!(droplet_id = %id, "droplet destroyed");
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────

    fn deadline(&self, timeout: Duration) -> Instant {
        Instant::now() + timeout
    }

    fn poll_context(&self, deadline: Instant) -> PollContext<'_> {
        PollContext {
            config: &self.config.poll,
            deadline,
            cancel: &self.cancel,
        }
    }

    /// Run one client call, giving up at the deadline or on cancellation.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        operation: &'static str,
        id: Option<DropletId>,
        call: impl Future<Output = ClientResult<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Timeout { operation, id }),
            _ = tokio::time::sleep_until(deadline) => Err(Error::Timeout { operation, id }),
            result = call => result.map_err(Error::from),
        }
    }

    /// Final read closing an operation. Tolerates the same transient faults
    /// as any poll, so a settled droplet is not reported as failed because
    /// of one bad read.
    async fn refresh(
        &self,
        id: DropletId,
        deadline: Instant,
        operation: &'static str,
        resizing: Option<(&str, &str)>,
    ) -> Result<CanonicalState> {
        let ctx = self.poll_context(deadline);
        let resource = poll::wait_for(&*self.client, id, &ctx, "refresh", |r| {
            if let Some((old_size, new_size)) = resizing {
                check_size(r, old_size, new_size)?;
            }
            Ok(true)
        })
        .await
        .map_err(|e| step_error(e, operation, id))?;

        Ok(project(&resource))
    }
}

/// During an update only the old and the new size may ever be observed.
fn check_size(resource: &RemoteResource, old: &str, new: &str) -> Result<()> {
    if resource.size_slug == old || resource.size_slug == new {
        return Ok(());
    }
    Err(Error::UnexpectedState(format!(
        "droplet {} reports size {} while moving from {old} to {new}",
        resource.id, resource.size_slug
    )))
}

fn step_error(err: PollError, operation: &'static str, id: DropletId) -> Error {
    match err {
        PollError::TimedOut { .. } | PollError::Cancelled { .. } => Error::Timeout {
            operation,
            id: Some(id),
        },
        PollError::Failed(err) => err,
    }
}

fn describe(last: Option<&Observation>) -> String {
    match last {
        Some(Observation::Present(resource)) => resource.status.to_string(),
        Some(Observation::Absent) => "absent".to_string(),
        None => "unknown".to_string(),
    }
}

//! Poll-until-condition over repeated droplet reads.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::{ClientError, ErrorClass};
use crate::types::{ActionId, ActionStatus, DropletId, RemoteResource};
use crate::{ComputeClient, Error, Result};

/// Backoff between consecutive reads of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Randomize each delay to 0.5x-1.5x.
    pub jitter: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(3),
            max_interval: Duration::from_secs(10),
            multiplier: 1.5,
            jitter: true,
        }
    }
}

impl PollConfig {
    /// Un-jittered delay after the given (zero-based) attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_interval.as_secs_f64()))
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter {
            return delay;
        }
        let factor = rand::rng().random_range(0.5..1.5);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }
}

/// Outcome of one successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Present(RemoteResource),
    Absent,
}

/// Bounds shared by every read of one lifecycle operation.
pub struct PollContext<'a> {
    pub config: &'a PollConfig,
    pub deadline: Instant,
    pub cancel: &'a CancellationToken,
}

#[derive(Debug)]
pub enum PollError {
    /// Deadline passed; `last` is the most recent successful read.
    TimedOut { last: Option<Observation> },
    Cancelled { last: Option<Observation> },
    /// A non-retryable failure, returned the moment it was seen.
    Failed(Error),
}

impl From<Error> for PollError {
    fn from(err: Error) -> Self {
        Self::Failed(err)
    }
}

/// Read until `predicate` accepts the droplet.
///
/// Transient faults are retried. A 404 fails the poll with
/// [`Error::NotFound`]: the droplet is expected to exist.
pub async fn wait_for<P>(
    client: &dyn ComputeClient,
    id: DropletId,
    ctx: &PollContext<'_>,
    waiting_for: &'static str,
    mut predicate: P,
) -> std::result::Result<RemoteResource, PollError>
where
    P: FnMut(&RemoteResource) -> Result<bool>,
{
    let mut poller = Poller::new(client, id, ctx, waiting_for);
    loop {
        if let Some(Observation::Present(resource)) = poller.observe(false).await?
            && predicate(&resource)?
        {
            return Ok(resource);
        }
        poller.pause().await?;
    }
}

/// Like [`wait_for`], but a 404 counts as "not there yet". Used right after
/// creation, before the provider lists the new droplet.
pub async fn wait_for_visible<P>(
    client: &dyn ComputeClient,
    id: DropletId,
    ctx: &PollContext<'_>,
    waiting_for: &'static str,
    mut predicate: P,
) -> std::result::Result<RemoteResource, PollError>
where
    P: FnMut(&RemoteResource) -> Result<bool>,
{
    let mut poller = Poller::new(client, id, ctx, waiting_for);
    loop {
        if let Some(Observation::Present(resource)) = poller.observe(true).await?
            && predicate(&resource)?
        {
            return Ok(resource);
        }
        poller.pause().await?;
    }
}

/// Like [`wait_for`] for the outcome of a submitted change.
///
/// Once the droplet is unlocked without satisfying `predicate`, the action
/// itself is checked, and an errored action fails the poll with
/// [`Error::ActionFailed`].
pub async fn wait_for_action<P>(
    client: &dyn ComputeClient,
    id: DropletId,
    action: ActionId,
    ctx: &PollContext<'_>,
    waiting_for: &'static str,
    mut predicate: P,
) -> std::result::Result<RemoteResource, PollError>
where
    P: FnMut(&RemoteResource) -> Result<bool>,
{
    let mut poller = Poller::new(client, id, ctx, waiting_for);
    loop {
        if let Some(Observation::Present(resource)) = poller.observe(false).await? {
            if predicate(&resource)? {
                return Ok(resource);
            }
            if !resource.locked {
                match poller.bounded(client.action_status(action)).await? {
                    Ok(ActionStatus::Errored) => {
                        return Err(PollError::Failed(Error::ActionFailed {
                            id,
                            action,
                            operation: waiting_for,
                        }));
                    }
                    Ok(status) => {
                        debug!(droplet_id = %id, action_id = %action, ?status, "change not visible yet");
                    }
                    Err(err) => poller.absorb(err)?,
                }
            }
        }
        poller.pause().await?;
    }
}

/// Read until the provider reports the droplet gone.
pub async fn wait_for_absent(
    client: &dyn ComputeClient,
    id: DropletId,
    ctx: &PollContext<'_>,
) -> std::result::Result<(), PollError> {
    let mut poller = Poller::new(client, id, ctx, "absent");
    loop {
        if let Some(Observation::Absent) = poller.observe(true).await? {
            return Ok(());
        }
        poller.pause().await?;
    }
}

/// Backoff and deadline state of one poll.
struct Poller<'p, 'a> {
    client: &'p dyn ComputeClient,
    id: DropletId,
    ctx: &'p PollContext<'a>,
    waiting_for: &'static str,
    attempt: u32,
    last: Option<Observation>,
}

impl<'p, 'a> Poller<'p, 'a> {
    fn new(
        client: &'p dyn ComputeClient,
        id: DropletId,
        ctx: &'p PollContext<'a>,
        waiting_for: &'static str,
    ) -> Self {
        Self {
            client,
            id,
            ctx,
            waiting_for,
            attempt: 0,
            last: None,
        }
    }

    /// Drive `fut` unless cancellation or the deadline comes first.
    async fn bounded<F: Future>(&self, fut: F) -> std::result::Result<F::Output, PollError> {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => Err(PollError::Cancelled { last: self.last.clone() }),
            _ = tokio::time::sleep_until(self.ctx.deadline) => Err(PollError::TimedOut { last: self.last.clone() }),
            output = fut => Ok(output),
        }
    }

    /// One read. `None` when it failed transiently.
    async fn observe(
        &mut self,
        absent_expected: bool,
    ) -> std::result::Result<Option<Observation>, PollError> {
        let observation = match self.bounded(self.client.retrieve(self.id)).await? {
            Ok(resource) => Observation::Present(resource),
            Err(err) if absent_expected && err.class() == ErrorClass::NotFound => {
                Observation::Absent
            }
            Err(err) => {
                self.absorb(err)?;
                return Ok(None);
            }
        };

        debug!(
            droplet_id = %self.id,
            attempt = self.attempt,
            waiting_for = self.waiting_for,
            ?observation,
            "polled droplet"
        );
        self.last = Some(observation.clone());
        Ok(Some(observation))
    }

    /// Swallow a transient fault; anything else ends the poll.
    fn absorb(&self, err: ClientError) -> std::result::Result<(), PollError> {
        match err.class() {
            ErrorClass::Transient | ErrorClass::Timeout => {
                warn!(droplet_id = %self.id, attempt = self.attempt, error = %err, "transient read failure, retrying");
                Ok(())
            }
            ErrorClass::NotFound | ErrorClass::RemoteRejected => {
                Err(PollError::Failed(err.into()))
            }
        }
    }

    async fn pause(&mut self) -> std::result::Result<(), PollError> {
        let delay = self.ctx.config.next_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.bounded(tokio::time::sleep(delay)).await
    }
}

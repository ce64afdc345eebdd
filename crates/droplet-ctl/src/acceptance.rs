//! Live acceptance scenarios.
//!
//! Each scenario creates a real droplet, checks both the canonical state
//! and the provider's own view of it, and always tears the droplet down
//! again, asserting that the provider then answers 404.

use do_api::DropletsClient;
use droplet_lifecycle::{CanonicalState, DesiredSpec, LifecycleManager, ReadOutcome};
use tracing::{error, info};

use crate::CtlError;
use crate::cli::Scenario;

fn basic() -> DesiredSpec {
    DesiredSpec::new("foo", "512mb", "centos-5-8-x32", "nyc2")
}

fn renamed_and_resized() -> DesiredSpec {
    DesiredSpec::new("baz", "1gb", "centos-5-8-x32", "nyc2")
}

pub async fn run(
    lifecycle: &LifecycleManager,
    api: &DropletsClient,
    scenario: Scenario,
) -> Result<(), CtlError> {
    if matches!(scenario, Scenario::Basic | Scenario::All) {
        with_droplet(lifecycle, api, "basic", |_| async { Ok(()) }).await?;
    }

    if matches!(scenario, Scenario::Update | Scenario::All) {
        with_droplet(lifecycle, api, "update", |id| async move {
            let state = lifecycle
                .update(&id, &basic(), &renamed_and_resized())
                .await?;
            expect_attr(&state, "name", "baz")?;
            expect_attr(&state, "size", "1gb")?;

            let droplet = api.get_droplet(parse_id(&id)?).await?;
            expect("size_slug", &droplet.size_slug, "1gb")?;
            expect("name", &droplet.name, "baz")?;
            Ok(())
        })
        .await?;
    }

    Ok(())
}

/// Create the basic droplet, run `steps`, then destroy it whatever happened.
async fn with_droplet<F, Fut>(
    lifecycle: &LifecycleManager,
    api: &DropletsClient,
    scenario: &'static str,
    steps: F,
) -> Result<(), CtlError>
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = Result<(), CtlError>>,
{
    info!(scenario, "acceptance: creating droplet");
    let state = lifecycle.create(&basic()).await?;
    let id = state.id().to_string();

    let outcome = async {
        check_basic(lifecycle, api, &state).await?;
        steps(id.clone()).await
    }
    .await;

    if let Err(e) = &outcome {
        error!(scenario, droplet_id = %id, error = %e, "acceptance: step failed, destroying");
    }

    lifecycle.delete(&id).await?;
    check_destroyed(api, &id).await?;
    info!(scenario, droplet_id = %id, "acceptance: passed destroy check");

    outcome
}

async fn check_basic(
    lifecycle: &LifecycleManager,
    api: &DropletsClient,
    state: &CanonicalState,
) -> Result<(), CtlError> {
    expect_attr(state, "name", "foo")?;
    expect_attr(state, "size", "512mb")?;
    expect_attr(state, "image", "centos-5-8-x32")?;
    expect_attr(state, "region", "nyc2")?;

    if !lifecycle.exists(state.id()).await? {
        return Err(CtlError::Check(format!("droplet {} not found", state.id())));
    }

    let droplet = api.get_droplet(parse_id(state.id())?).await?;
    if droplet.id.to_string() != state.id() {
        return Err(CtlError::Check("droplet not found".into()));
    }
    let image = droplet.image.and_then(|i| i.slug).unwrap_or_default();
    let region = droplet.region.map(|r| r.slug).unwrap_or_default();
    expect("image_slug", &image, "centos-5-8-x32")?;
    expect("size_slug", &droplet.size_slug, "512mb")?;
    expect("region_slug", &region, "nyc2")?;
    expect("name", &droplet.name, "foo")?;

    // A second read must not drift from what create reported.
    match lifecycle.read(state.id()).await? {
        ReadOutcome::Found(read) if read.size() == state.size() && read.name() == state.name() => {
            Ok(())
        }
        ReadOutcome::Found(read) => Err(CtlError::Check(format!(
            "state drifted after create: {:?}",
            read
        ))),
        ReadOutcome::NotFound => Err(CtlError::Check("droplet vanished after create".into())),
    }
}

async fn check_destroyed(api: &DropletsClient, id: &str) -> Result<(), CtlError> {
    match api.get_droplet(parse_id(id)?).await {
        Ok(_) => Err(CtlError::Check(format!("droplet {id} still exists"))),
        Err(e) if e.status().map(|s| s.as_u16()) == Some(404) => Ok(()),
        Err(e) => Err(CtlError::Check(format!(
            "error waiting for droplet ({id}) to be destroyed: {e}"
        ))),
    }
}

fn parse_id(id: &str) -> Result<u64, CtlError> {
    Ok(id.parse::<droplet_lifecycle::DropletId>()?.0)
}

fn expect_attr(state: &CanonicalState, key: &str, want: &str) -> Result<(), CtlError> {
    expect(key, state.get(key), want)
}

fn expect(what: &str, got: &str, want: &str) -> Result<(), CtlError> {
    if got == want {
        return Ok(());
    }
    Err(CtlError::Check(format!("bad {what}: {got} (expected {want})")))
}

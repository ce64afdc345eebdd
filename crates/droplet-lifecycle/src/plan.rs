//! Ordering of the remote operations an update needs.
//!
//! Renames go first since they never contend for the droplet lock. A resize
//! requires the droplet powered off, so it is bracketed by explicit
//! `PowerOff` / `PowerOn` steps rather than left to the provider.

use crate::types::{Change, DesiredSpec, DropletStatus, RemoteResource};
use crate::{Error, Result};

/// Compute the ordered steps that take `old` to `new`.
///
/// Attributes other than name, size and image cannot change in place and
/// fail with [`Error::RequiresReplacement`].
pub fn plan_update(old: &DesiredSpec, new: &DesiredSpec) -> Result<Vec<Change>> {
    if old.region != new.region {
        return Err(Error::RequiresReplacement("region"));
    }
    if old.ssh_keys != new.ssh_keys {
        return Err(Error::RequiresReplacement("ssh_keys"));
    }
    if old.backups_enabled != new.backups_enabled {
        return Err(Error::RequiresReplacement("backups_enabled"));
    }
    if old.ipv6_enabled != new.ipv6_enabled {
        return Err(Error::RequiresReplacement("ipv6_enabled"));
    }
    if old.private_networking != new.private_networking {
        return Err(Error::RequiresReplacement("private_networking"));
    }
    if old.user_data != new.user_data {
        return Err(Error::RequiresReplacement("user_data"));
    }

    let mut steps = Vec::new();

    if old.name != new.name {
        steps.push(Change::Rename {
            name: new.name.clone(),
        });
    }

    let resize = old.size != new.size;
    if resize {
        steps.push(Change::PowerOff);
        steps.push(Change::Resize {
            size: new.size.clone(),
        });
    }

    if old.image != new.image {
        steps.push(Change::Rebuild {
            image: new.image.clone(),
        });
    }

    if resize {
        steps.push(Change::PowerOn);
    }

    Ok(steps)
}

/// Whether `resource` shows `change` applied and the droplet unlocked.
pub fn is_settled(change: &Change, resource: &RemoteResource) -> bool {
    if resource.locked {
        return false;
    }
    match change {
        Change::Rename { name } => resource.name == *name,
        Change::Resize { size } => resource.size_slug == *size,
        Change::Rebuild { image } => resource.runs_image(image),
        Change::PowerOff => resource.status == DropletStatus::Off,
        Change::PowerOn => resource.status == DropletStatus::Active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DropletId;

    fn foo() -> DesiredSpec {
        DesiredSpec::new("foo", "512mb", "centos-5-8-x32", "nyc2")
    }

    #[test]
    fn identical_specs_need_nothing() {
        assert!(plan_update(&foo(), &foo()).unwrap().is_empty());
    }

    #[test]
    fn rename_and_resize_orders_rename_first_and_brackets_power() {
        let new = DesiredSpec::new("baz", "1gb", "centos-5-8-x32", "nyc2");
        let steps = plan_update(&foo(), &new).unwrap();
        assert_eq!(
            steps,
            vec![
                Change::Rename { name: "baz".into() },
                Change::PowerOff,
                Change::Resize { size: "1gb".into() },
                Change::PowerOn,
            ]
        );
    }

    #[test]
    fn image_change_alone_rebuilds_without_power_cycle() {
        let new = DesiredSpec::new("foo", "512mb", "ubuntu-14-04-x64", "nyc2");
        let steps = plan_update(&foo(), &new).unwrap();
        assert_eq!(
            steps,
            vec![Change::Rebuild {
                image: "ubuntu-14-04-x64".into()
            }]
        );
    }

    #[test]
    fn rebuild_runs_before_power_on() {
        let new = DesiredSpec::new("foo", "1gb", "ubuntu-14-04-x64", "nyc2");
        let labels: Vec<_> = plan_update(&foo(), &new)
            .unwrap()
            .iter()
            .map(Change::label)
            .collect();
        assert_eq!(labels, ["power_off", "resize", "rebuild", "power_on"]);
    }

    #[test]
    fn region_change_requires_replacement() {
        let new = DesiredSpec::new("baz", "512mb", "centos-5-8-x32", "sfo1");
        let err = plan_update(&foo(), &new).unwrap_err();
        assert!(matches!(err, Error::RequiresReplacement("region")));
    }

    #[test]
    fn ssh_key_change_requires_replacement() {
        let mut new = foo();
        new.ssh_keys.insert(123);
        assert!(matches!(
            plan_update(&foo(), &new),
            Err(Error::RequiresReplacement("ssh_keys"))
        ));
    }

    #[test]
    fn locked_droplet_is_never_settled() {
        let resource = RemoteResource {
            id: DropletId(1),
            status: DropletStatus::Off,
            name: "baz".into(),
            size_slug: "1gb".into(),
            image_slug: Some("centos-5-8-x32".into()),
            image_id: None,
            region_slug: "nyc2".into(),
            public_ip: None,
            private_ip: None,
            public_ipv6: None,
            locked: true,
        };

        assert!(!is_settled(&Change::PowerOff, &resource));
        assert!(is_settled(
            &Change::PowerOff,
            &RemoteResource {
                locked: false,
                ..resource
            }
        ));
    }
}

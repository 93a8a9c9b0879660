//! Reconciliation Engine
//!
//! Computes the minimal set of zone operations that converge a fabric's
//! active zone configuration to the desired initiator -> targets
//! connectivity. Pure set logic: no I/O, no clocks.

use crate::domain::model::{
    ActiveZoneConfiguration, ConnectivityRequest, PortIdentifier, ZoneOperation, ZoningPolicy,
};
use crate::error::{Error, Result};
use crate::zoning::naming::ZoneNamer;
use indexmap::IndexSet;
use std::collections::HashMap;
use tracing::debug;

/// Naming settings taken from the fabric endpoint
#[derive(Debug, Clone, Copy)]
pub struct NamingInputs<'a> {
    pub prefix: &'a str,
    pub charset: &'a str,
}

/// Tracks which zone definition claimed each name in one pass
#[derive(Default)]
struct NameClaims {
    owners: HashMap<String, String>,
}

impl NameClaims {
    fn claim(&mut self, zone: &str, owner: String) -> Result<()> {
        match self.owners.get(zone) {
            Some(existing) if *existing != owner => Err(Error::ZoneNameCollision {
                zone: zone.to_string(),
                first: existing.clone(),
                second: owner,
            }),
            Some(_) => Ok(()),
            None => {
                self.owners.insert(zone.to_string(), owner);
                Ok(())
            }
        }
    }
}

fn namer<'a>(
    desired: &'a ConnectivityRequest,
    policy: ZoningPolicy,
    naming: &NamingInputs<'a>,
) -> ZoneNamer<'a> {
    ZoneNamer {
        policy,
        prefix: naming.prefix,
        charset: naming.charset,
        host_name: desired.host_name.as_deref(),
        storage_system: desired.storage_system.as_deref(),
    }
}

fn checked_name(
    namer: &ZoneNamer<'_>,
    claims: &mut NameClaims,
    initiator: &PortIdentifier,
    target: Option<&PortIdentifier>,
) -> Result<String> {
    let name = namer.zone_name(initiator, target);
    if name.is_empty() {
        return Err(Error::InvalidZoneName {
            initiator: initiator.to_string(),
        });
    }
    let owner = match target {
        Some(t) => format!("{}->{}", initiator, t),
        None => initiator.to_string(),
    };
    claims.claim(&name, owner)?;
    Ok(name)
}

/// Operations needed to grant the desired connectivity.
///
/// Every zone is processed independently; per-zone failures are collected
/// and returned together once all siblings have been computed.
pub fn compute_operations(
    desired: &ConnectivityRequest,
    current: &ActiveZoneConfiguration,
    policy: ZoningPolicy,
    naming: &NamingInputs<'_>,
) -> Result<Vec<ZoneOperation>> {
    let namer = namer(desired, policy, naming);
    let mut claims = NameClaims::default();
    let mut operations = Vec::new();
    let mut failures = Vec::new();

    for (initiator, targets) in &desired.targets {
        match policy {
            ZoningPolicy::InitiatorTarget => {
                for target in targets {
                    if target == initiator {
                        debug!(port = %initiator, "Target is its own initiator, no zone needed");
                        continue;
                    }
                    let name = match checked_name(&namer, &mut claims, initiator, Some(target)) {
                        Ok(name) => name,
                        Err(e) => {
                            failures.push(e);
                            continue;
                        }
                    };
                    if current.contains_zone(&name) {
                        debug!(zone = %name, "Zone exists in initiator-target mode, skipping");
                        continue;
                    }
                    operations.push(ZoneOperation::Create {
                        name,
                        members: vec![initiator.clone(), target.clone()],
                    });
                }
            }
            ZoningPolicy::Initiator => {
                let name = match checked_name(&namer, &mut claims, initiator, None) {
                    Ok(name) => name,
                    Err(e) => {
                        failures.push(e);
                        continue;
                    }
                };
                let mut wanted: IndexSet<PortIdentifier> = IndexSet::new();
                wanted.insert(initiator.clone());
                wanted.extend(targets.iter().cloned());

                match current.zone(&name) {
                    None => operations.push(ZoneOperation::Create {
                        name,
                        members: wanted.into_iter().collect(),
                    }),
                    Some(existing) => {
                        let missing: Vec<_> =
                            wanted.into_iter().filter(|m| !existing.contains(m)).collect();
                        if missing.is_empty() {
                            debug!(zone = %name, "Zone already holds every target");
                        } else {
                            operations.push(ZoneOperation::UpdateAddMembers {
                                name,
                                members: missing,
                            });
                        }
                    }
                }
            }
        }
    }

    match Error::collect(failures) {
        Some(err) => Err(err),
        None => Ok(operations),
    }
}

/// Operations needed to withdraw the requested connectivity.
///
/// Under `initiator` the initiator is never removed on its own; the zone is
/// deleted once no other member would remain.
pub fn compute_removal_operations(
    to_remove: &ConnectivityRequest,
    current: &ActiveZoneConfiguration,
    policy: ZoningPolicy,
    naming: &NamingInputs<'_>,
) -> Result<Vec<ZoneOperation>> {
    let namer = namer(to_remove, policy, naming);
    let mut claims = NameClaims::default();
    let mut operations = Vec::new();
    let mut failures = Vec::new();

    for (initiator, targets) in &to_remove.targets {
        match policy {
            ZoningPolicy::InitiatorTarget => {
                for target in targets {
                    match checked_name(&namer, &mut claims, initiator, Some(target)) {
                        Ok(name) if current.contains_zone(&name) => {
                            operations.push(ZoneOperation::Delete { name })
                        }
                        Ok(name) => debug!(zone = %name, "Zone not present, nothing to delete"),
                        Err(e) => failures.push(e),
                    }
                }
            }
            ZoningPolicy::Initiator => {
                let name = match checked_name(&namer, &mut claims, initiator, None) {
                    Ok(name) => name,
                    Err(e) => {
                        failures.push(e);
                        continue;
                    }
                };
                let Some(existing) = current.zone(&name) else {
                    debug!(zone = %name, "Zone not present, nothing to remove");
                    continue;
                };

                let remaining = existing
                    .iter()
                    .filter(|m| *m != initiator && !targets.contains(*m))
                    .count();
                if remaining == 0 {
                    operations.push(ZoneOperation::Delete { name });
                    continue;
                }

                let members: Vec<_> = targets
                    .iter()
                    .filter(|t| *t != initiator && existing.contains(t))
                    .cloned()
                    .collect();
                if !members.is_empty() {
                    operations.push(ZoneOperation::UpdateRemoveMembers { name, members });
                }
            }
        }
    }

    match Error::collect(failures) {
        Some(err) => Err(err),
        None => Ok(operations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CISCO_ZONE_NAME_CHARSET;
    use crate::domain::model::ZoneMembership;
    use assert_matches::assert_matches;

    const NAMING: NamingInputs<'static> = NamingInputs {
        prefix: "openstack",
        charset: CISCO_ZONE_NAME_CHARSET,
    };

    fn wwn(s: &str) -> PortIdentifier {
        PortIdentifier::parse(s).unwrap()
    }

    fn request(initiator: &str, targets: &[&str]) -> ConnectivityRequest {
        let mut request = ConnectivityRequest::new();
        request.connect(wwn(initiator), targets.iter().map(|t| wwn(t)));
        request
    }

    fn config_with(zone: &str, members: &[&str]) -> ActiveZoneConfiguration {
        let mut config = ActiveZoneConfiguration::empty();
        config.name = Some("cfg".into());
        config.zones.insert(
            zone.to_string(),
            members.iter().map(|m| wwn(m)).collect::<ZoneMembership>(),
        );
        config
    }

    const I1: &str = "10:00:00:00:00:00:00:01";
    const T1: &str = "20:00:00:00:00:00:00:02";
    const T2: &str = "20:00:00:00:00:00:00:03";
    const IT_ZONE: &str = "openstack10000000000000012000000000000002";
    const I_ZONE: &str = "openstack1000000000000001";

    #[test]
    fn test_create_initiator_target_zone() {
        let ops = compute_operations(
            &request(I1, &[T1]),
            &ActiveZoneConfiguration::empty(),
            ZoningPolicy::InitiatorTarget,
            &NAMING,
        )
        .unwrap();

        assert_eq!(
            ops,
            vec![ZoneOperation::Create {
                name: IT_ZONE.into(),
                members: vec![wwn(I1), wwn(T1)],
            }]
        );
    }

    #[test]
    fn test_target_equal_to_initiator_gets_no_zone() {
        let ops = compute_operations(
            &request(I1, &[I1, T1]),
            &ActiveZoneConfiguration::empty(),
            ZoningPolicy::InitiatorTarget,
            &NAMING,
        )
        .unwrap();

        assert_eq!(
            ops,
            vec![ZoneOperation::Create {
                name: IT_ZONE.into(),
                members: vec![wwn(I1), wwn(T1)],
            }]
        );
    }

    #[test]
    fn test_existing_initiator_target_zone_is_noop() {
        let ops = compute_operations(
            &request(I1, &[T1]),
            &config_with(IT_ZONE, &[I1, T1]),
            ZoningPolicy::InitiatorTarget,
            &NAMING,
        )
        .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_initiator_zone_adds_only_missing_target() {
        let ops = compute_operations(
            &request(I1, &[T1, T2]),
            &config_with(I_ZONE, &[I1, T1]),
            ZoningPolicy::Initiator,
            &NAMING,
        )
        .unwrap();

        assert_eq!(
            ops,
            vec![ZoneOperation::UpdateAddMembers {
                name: I_ZONE.into(),
                members: vec![wwn(T2)],
            }]
        );
    }

    #[test]
    fn test_initiator_zone_created_with_all_members() {
        let ops = compute_operations(
            &request(I1, &[T1, T2]),
            &ActiveZoneConfiguration::empty(),
            ZoningPolicy::Initiator,
            &NAMING,
        )
        .unwrap();

        assert_eq!(
            ops,
            vec![ZoneOperation::Create {
                name: I_ZONE.into(),
                members: vec![wwn(I1), wwn(T1), wwn(T2)],
            }]
        );
    }

    #[test]
    fn test_compute_is_idempotent() {
        for policy in [ZoningPolicy::InitiatorTarget, ZoningPolicy::Initiator] {
            let desired = request(I1, &[T1, T2]);
            let mut current = ActiveZoneConfiguration::empty();

            let first = compute_operations(&desired, &current, policy, &NAMING).unwrap();
            assert!(!first.is_empty());
            current = current.with_operations(&first);

            let second = compute_operations(&desired, &current, policy, &NAMING).unwrap();
            assert!(second.is_empty(), "{:?} not idempotent: {:?}", policy, second);
        }
    }

    #[test]
    fn test_removing_last_target_deletes_initiator_zone() {
        let ops = compute_removal_operations(
            &request(I1, &[T1]),
            &config_with(I_ZONE, &[I1, T1]),
            ZoningPolicy::Initiator,
            &NAMING,
        )
        .unwrap();
        assert_eq!(ops, vec![ZoneOperation::Delete { name: I_ZONE.into() }]);
    }

    #[test]
    fn test_removing_one_of_two_targets_updates_zone() {
        let ops = compute_removal_operations(
            &request(I1, &[T1]),
            &config_with(I_ZONE, &[I1, T1, T2]),
            ZoningPolicy::Initiator,
            &NAMING,
        )
        .unwrap();
        assert_eq!(
            ops,
            vec![ZoneOperation::UpdateRemoveMembers {
                name: I_ZONE.into(),
                members: vec![wwn(T1)],
            }]
        );
    }

    #[test]
    fn test_removal_never_lists_initiator() {
        // initiator passed as its own target must not be stripped from the zone
        let ops = compute_removal_operations(
            &request(I1, &[I1, T1]),
            &config_with(I_ZONE, &[I1, T1, T2]),
            ZoningPolicy::Initiator,
            &NAMING,
        )
        .unwrap();
        assert_eq!(
            ops,
            vec![ZoneOperation::UpdateRemoveMembers {
                name: I_ZONE.into(),
                members: vec![wwn(T1)],
            }]
        );
    }

    #[test]
    fn test_removal_initiator_target() {
        let current = config_with(IT_ZONE, &[I1, T1]);
        let ops = compute_removal_operations(
            &request(I1, &[T1, T2]),
            &current,
            ZoningPolicy::InitiatorTarget,
            &NAMING,
        )
        .unwrap();
        // only the zone that exists is deleted
        assert_eq!(ops, vec![ZoneOperation::Delete { name: IT_ZONE.into() }]);

        let after = current.with_operations(&ops);
        let again = compute_removal_operations(
            &request(I1, &[T1, T2]),
            &after,
            ZoningPolicy::InitiatorTarget,
            &NAMING,
        )
        .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_collision_reported_and_siblings_processed() {
        // a charset without hex letters makes distinct targets collide
        let naming = NamingInputs {
            prefix: "z",
            charset: "z0123456789",
        };
        let desired = request(
            "10:00:00:00:00:00:00:01",
            &["20:00:00:00:00:00:00:0a", "20:00:00:00:00:00:00:0b"],
        );
        let err = compute_operations(
            &desired,
            &ActiveZoneConfiguration::empty(),
            ZoningPolicy::InitiatorTarget,
            &naming,
        )
        .unwrap_err();
        assert_matches!(err, Error::ZoneNameCollision { zone, .. } if zone == "z1000000000000001200000000000000");
    }

    #[test]
    fn test_failures_are_aggregated() {
        let naming = NamingInputs {
            prefix: "",
            charset: "",
        };
        let mut desired = request(I1, &[T1]);
        desired.connect(wwn("10:00:00:00:00:00:00:09"), [wwn(T2)]);

        let err = compute_operations(
            &desired,
            &ActiveZoneConfiguration::empty(),
            ZoningPolicy::Initiator,
            &naming,
        )
        .unwrap_err();
        assert_matches!(err, Error::Aggregate(errors) if errors.len() == 2);
    }
}

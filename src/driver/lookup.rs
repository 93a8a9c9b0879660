//! SAN Lookup
//!
//! Finds which configured fabrics a set of initiator and target ports is
//! logged into, by reading every fabric's name server concurrently.

use crate::domain::model::PortIdentifier;
use crate::driver::ZoneDriver;
use crate::error::{Error, Result};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Ports visible on one fabric
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FabricDeviceMapping {
    pub initiator_port_wwn_list: Vec<PortIdentifier>,
    pub target_port_wwn_list: Vec<PortIdentifier>,
}

impl ZoneDriver {
    /// Map every configured fabric to the given initiators and targets that
    /// are logged into it
    pub async fn get_device_mapping_from_network(
        &self,
        initiators: &[PortIdentifier],
        targets: &[PortIdentifier],
    ) -> Result<BTreeMap<String, FabricDeviceMapping>> {
        let lookups = self.config().fabrics.keys().map(|fabric| async move {
            let endpoint = self.config().fabric(fabric)?;
            let entries = self
                .connector(fabric)?
                .get_nameserver_entries(endpoint)
                .await?;
            let visible: HashSet<&PortIdentifier> = entries.iter().map(|e| &e.wwn).collect();

            let mapping = FabricDeviceMapping {
                initiator_port_wwn_list: visible_subset(initiators, &visible),
                target_port_wwn_list: visible_subset(targets, &visible),
            };
            debug!(
                fabric = %fabric,
                initiators = mapping.initiator_port_wwn_list.len(),
                targets = mapping.target_port_wwn_list.len(),
                "Resolved device mapping"
            );
            Ok::<_, Error>((fabric.clone(), mapping))
        });

        join_all(lookups).await.into_iter().collect()
    }

    /// Targets visible per fabric, omitting fabrics where none are logged in
    pub async fn get_san_context(
        &self,
        targets: &[PortIdentifier],
    ) -> Result<BTreeMap<String, Vec<PortIdentifier>>> {
        let mapping = self.get_device_mapping_from_network(&[], targets).await?;
        Ok(mapping
            .into_iter()
            .filter(|(_, m)| !m.target_port_wwn_list.is_empty())
            .map(|(fabric, m)| (fabric, m.target_port_wwn_list))
            .collect())
    }
}

fn visible_subset(
    wanted: &[PortIdentifier],
    visible: &HashSet<&PortIdentifier>,
) -> Vec<PortIdentifier> {
    let mut seen = HashSet::new();
    wanted
        .iter()
        .filter(|wwn| visible.contains(wwn) && seen.insert(*wwn))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FabricEndpoint, ZoningConfig};
    use crate::driver::tests::{driver_for, test_config};
    use crate::fabric::session::testing::ScriptedConnector;
    use assert_matches::assert_matches;

    const NAMESERVER: &str = "\
FCID        TYPE  PWWN                    (VENDOR)        FC4-TYPE:FEATURE
--------------------------------------------------------------------------
0x030d00    N     10:00:00:00:00:00:00:01 (Emulex)        scsi-fcp:init
0x030800    N     20:00:00:00:00:00:00:02 (Cisco)         scsi-fcp:target
0x030900    NL    20:00:00:00:00:00:00:03                 scsi-fcp:target
";

    fn wwn(s: &str) -> PortIdentifier {
        PortIdentifier::parse(s).unwrap()
    }

    fn two_fabrics() -> ZoningConfig {
        test_config("initiator-target").with_fabric(FabricEndpoint::new(
            "fabB", "10.0.0.2", "admin", "pw", 305,
        ))
    }

    #[tokio::test]
    async fn test_device_mapping_filters_to_visible_node_ports() {
        let switch = ScriptedConnector::new();
        switch.respond("show fcns database vsan 304", NAMESERVER);
        switch.respond("show fcns database vsan 305", "FCID TYPE PWWN\n");
        let driver = driver_for(&switch, two_fabrics());

        let mapping = driver
            .get_device_mapping_from_network(
                &[wwn("1000000000000001"), wwn("1000000000000009")],
                &[wwn("2000000000000002"), wwn("2000000000000003")],
            )
            .await
            .unwrap();

        assert_eq!(mapping.len(), 2);
        let fab_a = &mapping["fabA"];
        assert_eq!(fab_a.initiator_port_wwn_list, vec![wwn("1000000000000001")]);
        // NL ports are not node ports
        assert_eq!(fab_a.target_port_wwn_list, vec![wwn("2000000000000002")]);
        assert_eq!(mapping["fabB"], FabricDeviceMapping::default());
    }

    #[tokio::test]
    async fn test_san_context_omits_empty_fabrics() {
        let switch = ScriptedConnector::new();
        switch.respond("show fcns database vsan 304", NAMESERVER);
        switch.respond("show fcns database vsan 305", "FCID TYPE PWWN\n");
        let driver = driver_for(&switch, two_fabrics());

        let context = driver
            .get_san_context(&[wwn("2000000000000002")])
            .await
            .unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context["fabA"], vec![wwn("2000000000000002")]);
    }

    #[tokio::test]
    async fn test_malformed_nameserver_fails_lookup() {
        let switch = ScriptedConnector::new();
        switch.respond("show fcns database", "VSAN 304 is not configured\n");
        let driver = driver_for(&switch, two_fabrics());

        let err = driver
            .get_san_context(&[wwn("2000000000000002")])
            .await
            .unwrap_err();
        assert_matches!(err, Error::MalformedOutput { .. });
    }
}

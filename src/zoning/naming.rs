//! Zone Name Resolution
//!
//! Deterministic zone names for an initiator/target pair or an initiator
//! group, in the same format earlier Cinder deployments used. Sanitization
//! is lossy; collisions are caught by the reconciliation engine.

use crate::domain::model::{PortIdentifier, ZoningPolicy};

/// Host name budget in an initiator-target zone name
pub const PAIR_HOST_NAME_LIMIT: usize = 14;
/// Storage system name budget in an initiator-target zone name
pub const PAIR_STORAGE_NAME_LIMIT: usize = 14;
/// Host name budget in an initiator zone name
pub const INITIATOR_HOST_NAME_LIMIT: usize = 47;

/// Naming inputs that stay fixed for a whole reconciliation pass
#[derive(Debug, Clone, Copy)]
pub struct ZoneNamer<'a> {
    pub policy: ZoningPolicy,
    pub prefix: &'a str,
    pub charset: &'a str,
    pub host_name: Option<&'a str>,
    pub storage_system: Option<&'a str>,
}

impl<'a> ZoneNamer<'a> {
    /// Zone name for an initiator and, under `initiator-target`, its target
    pub fn zone_name(&self, initiator: &PortIdentifier, target: Option<&PortIdentifier>) -> String {
        resolve(
            self.policy,
            initiator,
            target,
            self.host_name,
            self.storage_system,
            self.prefix,
            self.charset,
        )
    }
}

/// Build a zone name.
///
/// With both display names available the friendly form is
/// `host_initiator_storage_target` (initiator-target) or `host_initiator`
/// (initiator); otherwise the prefix form is used. Characters outside
/// `allowed_charset` are dropped afterwards.
pub fn resolve(
    policy: ZoningPolicy,
    initiator: &PortIdentifier,
    target: Option<&PortIdentifier>,
    host_name: Option<&str>,
    storage_system: Option<&str>,
    prefix: &str,
    allowed_charset: &str,
) -> String {
    let initiator = initiator.compact();
    let host = host_name.filter(|h| !h.is_empty());

    let raw = match policy {
        ZoningPolicy::InitiatorTarget => {
            let target = target.map(PortIdentifier::compact).unwrap_or_default();
            match (host, storage_system.filter(|s| !s.is_empty())) {
                (Some(host), Some(storage)) => format!(
                    "{}_{}_{}_{}",
                    truncate(host, PAIR_HOST_NAME_LIMIT),
                    initiator,
                    truncate(storage, PAIR_STORAGE_NAME_LIMIT),
                    target
                ),
                _ => format!("{}{}{}", prefix, initiator, target),
            }
        }
        ZoningPolicy::Initiator => match host {
            Some(host) => format!("{}_{}", truncate(host, INITIATOR_HOST_NAME_LIMIT), initiator),
            None => format!("{}{}", prefix, initiator),
        },
    };

    sanitize(&raw, allowed_charset)
}

fn truncate(value: &str, limit: usize) -> &str {
    match value.char_indices().nth(limit) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Drop every character not in the allowed set
pub fn sanitize(name: &str, allowed_charset: &str) -> String {
    name.chars().filter(|c| allowed_charset.contains(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CISCO_ZONE_NAME_CHARSET;

    fn wwn(s: &str) -> PortIdentifier {
        PortIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_prefix_form_initiator_target() {
        let name = resolve(
            ZoningPolicy::InitiatorTarget,
            &wwn("10:00:00:00:00:00:00:01"),
            Some(&wwn("20:00:00:00:00:00:00:02")),
            None,
            None,
            "openstack",
            CISCO_ZONE_NAME_CHARSET,
        );
        assert_eq!(name, "openstack10000000000000012000000000000002");
    }

    #[test]
    fn test_friendly_form_initiator_target() {
        let name = resolve(
            ZoningPolicy::InitiatorTarget,
            &wwn("10:00:00:00:00:00:00:01"),
            Some(&wwn("20:00:00:00:00:00:00:02")),
            Some("compute-node-0001.example.com"),
            Some("array-east-production"),
            "openstack",
            CISCO_ZONE_NAME_CHARSET,
        );
        assert_eq!(
            name,
            "compute-node-0_1000000000000001_array-east-pro_2000000000000002"
        );
        assert!(name.len() <= 64);
    }

    #[test]
    fn test_friendly_form_needs_both_names() {
        let initiator = wwn("10:00:00:00:00:00:00:01");
        let target = wwn("20:00:00:00:00:00:00:02");
        let name = resolve(
            ZoningPolicy::InitiatorTarget,
            &initiator,
            Some(&target),
            Some("host1"),
            None,
            "os_",
            CISCO_ZONE_NAME_CHARSET,
        );
        assert_eq!(name, "os_10000000000000012000000000000002");
    }

    #[test]
    fn test_initiator_policy_forms() {
        let initiator = wwn("10:00:00:00:00:00:00:01");
        let friendly = resolve(
            ZoningPolicy::Initiator,
            &initiator,
            None,
            Some(&"h".repeat(80)),
            Some("ignored"),
            "openstack",
            CISCO_ZONE_NAME_CHARSET,
        );
        assert_eq!(friendly, format!("{}_1000000000000001", "h".repeat(47)));
        assert_eq!(friendly.len(), INITIATOR_HOST_NAME_LIMIT + 1 + 16);

        let fallback = resolve(
            ZoningPolicy::Initiator,
            &initiator,
            None,
            Some(""),
            None,
            "openstack",
            CISCO_ZONE_NAME_CHARSET,
        );
        assert_eq!(fallback, "openstack1000000000000001");
    }

    #[test]
    fn test_name_is_deterministic() {
        let namer = ZoneNamer {
            policy: ZoningPolicy::InitiatorTarget,
            prefix: "openstack",
            charset: CISCO_ZONE_NAME_CHARSET,
            host_name: Some("host"),
            storage_system: Some("array"),
        };
        let i = wwn("1000000000000001");
        let t = wwn("2000000000000002");
        assert_eq!(namer.zone_name(&i, Some(&t)), namer.zone_name(&i, Some(&t)));
    }

    #[test]
    fn test_sanitize_is_lossy() {
        assert_eq!(sanitize("a.b c/d_e", CISCO_ZONE_NAME_CHARSET), "abcd_e");
        assert_eq!(sanitize("host.1", CISCO_ZONE_NAME_CHARSET), sanitize("host1", CISCO_ZONE_NAME_CHARSET));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo-wörld", 4), "héll");
        assert_eq!(truncate("abc", 14), "abc");
    }
}

//! Tenant → destination mapping.

use std::collections::HashMap;

use crate::config::{RelayConfig, TenantMapping};

/// Maps identity zones to destination names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantMap {
    by_tenant: HashMap<String, String>,
    default_destination: Option<String>,
}

impl TenantMap {
    pub fn new(mappings: &[TenantMapping], default_destination: Option<String>) -> Self {
        let by_tenant = mappings
            .iter()
            .map(|m| (m.tenant.clone(), m.destination.clone()))
            .collect();
        Self {
            by_tenant,
            default_destination,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(&config.tenants, config.default_destination.clone())
    }

    /// Destination for a request: route override, then the tenant's entry,
    /// then the default.
    pub fn destination_for<'a>(
        &'a self,
        route_override: Option<&'a str>,
        tenant: Option<&str>,
    ) -> Option<&'a str> {
        route_override
            .or_else(|| tenant.and_then(|t| self.by_tenant.get(t)).map(String::as_str))
            .or(self.default_destination.as_deref())
    }

    pub fn len(&self) -> usize {
        self.by_tenant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tenant.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT_A: &str = "47aa380c-4f1d-439f-ab07-5784e5074e8e";
    const TENANT_B: &str = "91dc4ba1-07de-4d6a-8aa3-6ba6e1bb2f2b";

    fn map(default: Option<&str>) -> TenantMap {
        TenantMap::new(
            &[
                TenantMapping { tenant: TENANT_A.into(), destination: "MTAPPDest1".into() },
                TenantMapping { tenant: TENANT_B.into(), destination: "MTAPPDest2".into() },
            ],
            default.map(String::from),
        )
    }

    #[test]
    fn test_tenant_lookup() {
        let tenants = map(None);
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants.destination_for(None, Some(TENANT_A)), Some("MTAPPDest1"));
        assert_eq!(tenants.destination_for(None, Some(TENANT_B)), Some("MTAPPDest2"));
        assert_eq!(tenants.destination_for(None, Some("unknown")), None);
        assert_eq!(tenants.destination_for(None, None), None);
    }

    #[test]
    fn test_route_override_wins() {
        let tenants = map(Some("Fallback"));
        assert_eq!(tenants.destination_for(Some("Pinned"), Some(TENANT_A)), Some("Pinned"));
    }

    #[test]
    fn test_default_used_for_unmapped_tenant() {
        let tenants = map(Some("Fallback"));
        assert_eq!(tenants.destination_for(None, Some("unknown")), Some("Fallback"));
        assert_eq!(tenants.destination_for(None, None), Some("Fallback"));
    }
}

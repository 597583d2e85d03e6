use crate::config::RoutingConfig;
use std::collections::HashMap;
use zamp_query::{BackendKind, DataError, Result};

/// Maps a merchant and backend kind to the instance that serves it
#[derive(Debug, Clone, Default)]
pub struct InstanceRouter {
    defaults: HashMap<BackendKind, String>,
    overrides: HashMap<String, HashMap<BackendKind, String>>,
}

impl InstanceRouter {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            defaults: config.defaults.clone(),
            overrides: config.merchant_overrides.clone(),
        }
    }

    pub fn with_default(mut self, kind: BackendKind, instance_id: impl Into<String>) -> Self {
        self.defaults.insert(kind, instance_id.into());
        self
    }

    pub fn with_override(
        mut self,
        merchant_id: impl Into<String>,
        kind: BackendKind,
        instance_id: impl Into<String>,
    ) -> Self {
        self.overrides
            .entry(merchant_id.into())
            .or_default()
            .insert(kind, instance_id.into());
        self
    }

    /// Instance id for a merchant; only the real-time and lakehouse kinds are routable
    pub fn resolve(&self, merchant_id: &str, kind: BackendKind) -> Result<String> {
        if !matches!(
            kind,
            BackendKind::RealtimeColumnar | BackendKind::LakehouseSql
        ) {
            return Err(DataError::UnsupportedProviderType(kind));
        }

        self.overrides
            .get(merchant_id)
            .and_then(|o| o.get(&kind))
            .or_else(|| self.defaults.get(&kind))
            .cloned()
            .ok_or_else(|| DataError::ConfigNotInitialized {
                kind,
                instance_id: "default".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zamp_query::ErrorKind;

    fn router() -> InstanceRouter {
        InstanceRouter::default()
            .with_default(BackendKind::LakehouseSql, "dbx-default")
            .with_default(BackendKind::RealtimeColumnar, "pinot-default")
            .with_override("m2", BackendKind::LakehouseSql, "dbx-m2")
    }

    #[test]
    fn test_override_then_default() {
        let router = router();
        assert_eq!(
            router.resolve("m2", BackendKind::LakehouseSql).unwrap(),
            "dbx-m2"
        );
        // Overrides are per kind
        assert_eq!(
            router.resolve("m2", BackendKind::RealtimeColumnar).unwrap(),
            "pinot-default"
        );
        assert_eq!(
            router.resolve("m1", BackendKind::LakehouseSql).unwrap(),
            "dbx-default"
        );
    }

    #[test]
    fn test_relational_is_not_routable() {
        let err = router().resolve("m1", BackendKind::Relational).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedProviderType);
    }

    #[test]
    fn test_missing_default() {
        let err = InstanceRouter::default()
            .resolve("m1", BackendKind::LakehouseSql)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigNotInitialized);
    }
}

//! Deployment manifest and the recorders that persist it.
//!
//! A manifest is an insertion-ordered `component name -> address` map plus
//! network metadata. It serializes as one flat JSON object:
//!
//! ```json
//! {
//!   "Reserve": "0x…",
//!   "GoodDollar": "0x…",
//!   "network": "develop",
//!   "networkId": 4447,
//!   "runId": "…",
//!   "recordedAt": "2026-01-01T00:00:00Z"
//! }
//! ```
//!
//! The file recorder nests manifests as `{ tag: { network: manifest } }`.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::context::NetworkInfo;
use crate::error::{ProvisionError, ProvisionResult};
use crate::model::{CollateralSet, EconomicModule, GovernanceOutcome, Organization, UbiModule};
use crate::types::{Address, RunId};

/// Address map produced by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentManifest {
    run_id: RunId,
    network: NetworkInfo,
    recorded_at: DateTime<Utc>,
    components: Vec<(String, Address)>,
}

impl DeploymentManifest {
    /// Creates an empty manifest stamped with the current time.
    #[must_use]
    pub fn new(run_id: RunId, network: NetworkInfo) -> Self {
        Self {
            run_id,
            network,
            recorded_at: Utc::now(),
            components: Vec::new(),
        }
    }

    /// Builds the manifest of a completed run.
    ///
    /// Governance entries are left out when governance is absent.
    #[must_use]
    pub fn from_run(
        run_id: RunId,
        network: NetworkInfo,
        collateral: &CollateralSet,
        organization: &Organization,
        economy: &EconomicModule,
        governance: &GovernanceOutcome,
        ubi: &UbiModule,
    ) -> Self {
        let mut manifest = Self::new(run_id, network);
        manifest.insert("Reserve", economy.reserve);
        manifest.insert("GoodDollar", organization.native_token);
        manifest.insert("Identity", organization.identity);
        manifest.insert("Avatar", organization.avatar);
        manifest.insert("Controller", organization.controller);
        manifest.insert("FeeFormula", organization.fee_formula);
        if let Some(module) = governance.module() {
            manifest.insert("AbsoluteVote", module.voting_machine);
            manifest.insert("SchemeRegistrar", module.scheme_registrar);
            manifest.insert("UpgradeScheme", module.upgrade_scheme);
        }
        manifest.insert("DAI", collateral.collateral_token);
        manifest.insert("cDAI", collateral.yield_token);
        manifest.insert("COMP", collateral.reward_token);
        manifest.insert("Contribution", economy.contribution);
        manifest.insert("FundManager", economy.fund_manager);
        manifest.insert("DAIStaking", economy.staking);
        manifest.insert("MarketMaker", economy.market_maker);
        manifest.insert("FirstClaimPool", ubi.first_claim_pool);
        manifest.insert("UBIScheme", ubi.ubi_scheme);
        manifest
    }

    /// Adds a component, replacing the address of an existing one in place.
    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        let name = name.into();
        match self.components.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = address,
            None => self.components.push((name, address)),
        }
    }

    /// Address of a component.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Address> {
        self.components
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, address)| *address)
    }

    /// Components in insertion order.
    #[must_use]
    pub fn components(&self) -> &[(String, Address)] {
        &self.components
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True if no component was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Network the manifest belongs to.
    #[must_use]
    pub const fn network(&self) -> &NetworkInfo {
        &self.network
    }

    /// Run that produced the manifest.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// When the manifest was built.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

impl Serialize for DeploymentManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.components.len() + 4))?;
        for (name, address) in &self.components {
            map.serialize_entry(name, address)?;
        }
        map.serialize_entry("network", &self.network.name)?;
        map.serialize_entry("networkId", &self.network.id)?;
        map.serialize_entry("runId", &self.run_id)?;
        map.serialize_entry("recordedAt", &self.recorded_at)?;
        map.end()
    }
}

/// Persists manifests under a tag.
pub trait ManifestRecorder: Send + Sync {
    /// Records `manifest` under `tag`, replacing any previous manifest for the same network.
    ///
    /// # Errors
    ///
    /// Returns error if the manifest cannot be persisted.
    fn record(
        &self,
        tag: &str,
        manifest: &DeploymentManifest,
    ) -> impl Future<Output = ProvisionResult<()>> + Send;
}

/// Recorder writing a pretty-printed JSON document `{ tag: { network: manifest } }`.
#[derive(Debug, Clone)]
pub struct JsonFileRecorder {
    path: PathBuf,
}

impl JsonFileRecorder {
    /// Creates a recorder for `path`; the file is created on first record.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File the recorder writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> ProvisionResult<serde_json::Map<String, serde_json::Value>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(serde_json::Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        match serde_json::from_str(&raw)? {
            serde_json::Value::Object(document) => Ok(document),
            other => Err(ProvisionError::Recorder(format!(
                "{} holds a JSON {}, expected an object",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl ManifestRecorder for JsonFileRecorder {
    async fn record(&self, tag: &str, manifest: &DeploymentManifest) -> ProvisionResult<()> {
        let mut document = self.load().await?;
        let entry = document
            .entry(tag.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        let serde_json::Value::Object(networks) = entry else {
            return Err(ProvisionError::Recorder(format!(
                "tag {tag} in {} is not an object",
                self.path.display()
            )));
        };
        networks.insert(manifest.network().name.clone(), serde_json::to_value(manifest)?);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let pretty = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&self.path, pretty).await?;

        info!(
            path = %self.path.display(),
            tag,
            network = %manifest.network().name,
            components = manifest.len(),
            "manifest recorded"
        );
        Ok(())
    }
}

/// In-memory recorder.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    records: Arc<Mutex<Vec<(String, DeploymentManifest)>>>,
}

impl MemoryRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded `(tag, manifest)` pair, oldest first.
    pub async fn records(&self) -> Vec<(String, DeploymentManifest)> {
        self.records.lock().await.clone()
    }

    /// Most recent manifest recorded under `tag`.
    pub async fn latest(&self, tag: &str) -> Option<DeploymentManifest> {
        self.records
            .lock()
            .await
            .iter()
            .rev()
            .find(|(t, _)| t == tag)
            .map(|(_, manifest)| manifest.clone())
    }
}

impl ManifestRecorder for MemoryRecorder {
    async fn record(&self, tag: &str, manifest: &DeploymentManifest) -> ProvisionResult<()> {
        debug!(tag, components = manifest.len(), "manifest kept in memory");
        self.records
            .lock()
            .await
            .push((tag.to_string(), manifest.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(network: &str) -> DeploymentManifest {
        let mut manifest = DeploymentManifest::new(RunId::new(), NetworkInfo::new(network, 4447));
        manifest.insert("Reserve", Address::from_bytes([1; 20]));
        manifest.insert("GoodDollar", Address::from_bytes([2; 20]));
        manifest
    }

    mod deployment_manifest {
        use super::*;

        #[test]
        fn insert_replaces_in_place() {
            let mut manifest = manifest("develop");
            manifest.insert("Reserve", Address::from_bytes([9; 20]));
            assert_eq!(manifest.len(), 2);
            assert_eq!(manifest.components()[0].0, "Reserve");
            assert_eq!(manifest.get("Reserve"), Some(Address::from_bytes([9; 20])));
            assert_eq!(manifest.get("Avatar"), None);
        }

        #[test]
        fn serializes_flat_with_network_metadata() {
            let json = serde_json::to_value(manifest("develop")).unwrap_or_default();
            assert_eq!(json["network"], "develop");
            assert_eq!(json["networkId"], 4447);
            assert_eq!(json["Reserve"], format!("0x{}", "01".repeat(20)));
            assert!(json["runId"].is_string());
            assert!(json["recordedAt"].is_string());
        }
    }

    mod json_file_recorder {
        use super::*;

        #[tokio::test]
        async fn creates_parent_directories() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("releases").join("deployment.json");
            let recorder = JsonFileRecorder::new(&path);

            recorder.record("olddao", &manifest("develop")).await.expect("record");

            let raw = std::fs::read_to_string(&path).expect("read");
            let document: serde_json::Value = serde_json::from_str(&raw).expect("parse");
            assert_eq!(document["olddao"]["develop"]["networkId"], 4447);
        }

        #[tokio::test]
        async fn keeps_other_tags_and_networks() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("deployment.json");
            std::fs::write(&path, r#"{"production": {"fuse": {"Reserve": "0x00"}}}"#)
                .expect("seed");
            let recorder = JsonFileRecorder::new(&path);

            recorder.record("olddao", &manifest("develop")).await.expect("first");
            recorder.record("olddao", &manifest("staging")).await.expect("second");

            let raw = std::fs::read_to_string(&path).expect("read");
            let document: serde_json::Value = serde_json::from_str(&raw).expect("parse");
            assert_eq!(document["production"]["fuse"]["Reserve"], "0x00");
            assert!(document["olddao"]["develop"].is_object());
            assert!(document["olddao"]["staging"].is_object());
        }

        #[tokio::test]
        async fn rejects_non_object_document() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("deployment.json");
            std::fs::write(&path, "[1, 2, 3]").expect("seed");

            let result = JsonFileRecorder::new(&path).record("olddao", &manifest("develop")).await;
            assert!(matches!(result, Err(ProvisionError::Recorder(_))));
        }
    }

    #[tokio::test]
    async fn memory_recorder_returns_latest_per_tag() {
        let recorder = MemoryRecorder::new();
        recorder.record("a", &manifest("develop")).await.expect("a1");
        recorder.record("b", &manifest("staging")).await.expect("b");
        recorder.record("a", &manifest("fuse")).await.expect("a2");

        assert_eq!(recorder.records().await.len(), 3);
        let latest = recorder.latest("a").await.map(|m| m.network().name.clone());
        assert_eq!(latest.as_deref(), Some("fuse"));
        assert!(recorder.latest("missing").await.is_none());
    }
}

//! Cleanup of unused director resources.
//!
//! `clean_up` has two modes:
//!
//! - **Dry run**: `GET /cleanup/dryrun?remove_all=<all>` answers right away
//!   with a [`CleanUp`] report of what would be deleted.
//! - **Committed**: `POST /cleanup` with `{"config":{"remove_all":<all>}}`
//!   starts a director task, which is followed to completion. The task's
//!   result payload is not decoded and the call returns
//!   `CleanUp::default()`; only success or failure is reported.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::Client;
use crate::error::{Result, ResultExt};
use crate::orphaned_vms::OrphanedVmResponse;
use crate::request::{SyncOp, encode_json, json_headers, with_query};
use crate::task::AsyncOp;

const CLEANUP_PATH: &str = "/cleanup";
const CLEANUP_DRY_RUN_PATH: &str = "/cleanup/dryrun";

// ── Report types ───────────────────────────────────────────────────────
//
// Every collection defaults to empty so that directors which omit a
// category (older versions have no `dns_blobs` or `orphaned_vms`) still
// decode.

/// What a cleanup would remove, as reported by the director.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanUp {
    /// Release versions no deployment uses.
    pub releases: Vec<CleanableRelease>,
    /// Stemcells no deployment uses.
    pub stemcells: Vec<CleanableStemcell>,
    /// Compiled packages for unused stemcells.
    pub compiled_packages: Vec<CleanableCompiledPackage>,
    /// Persistent disks detached from any deployment.
    pub orphaned_disks: Vec<CleanableOrphanedDisk>,
    /// Orphaned VMs, in wire form.
    pub orphaned_vms: Vec<OrphanedVmResponse>,
    /// Blobstore ids of exported release tarballs.
    pub exported_releases: Vec<String>,
    /// Blobstore ids of stale DNS record blobs.
    pub dns_blobs: Vec<String>,
}

/// A release and the versions of it that would be deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanableRelease {
    /// Release name.
    pub name: String,
    /// Unused versions.
    pub versions: Vec<String>,
}

/// A stemcell that would be deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanableStemcell {
    /// Stemcell name.
    pub name: String,
    /// Stemcell version.
    pub version: String,
    /// Operating system, when reported.
    pub operating_system: Option<String>,
    /// Cloud identifier of the stemcell image, when reported.
    pub cid: Option<String>,
}

/// A compiled package that would be deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanableCompiledPackage {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Stemcell the package was compiled against.
    pub stemcell: Option<CompiledAgainst>,
}

/// Stemcell identity of a compiled package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompiledAgainst {
    /// Operating system.
    pub os: String,
    /// Stemcell version.
    pub version: String,
}

/// An orphaned persistent disk that would be deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanableOrphanedDisk {
    /// Cloud identifier of the disk.
    pub disk_cid: String,
    /// Disk size in MiB.
    pub size: Option<u64>,
    /// Deployment the disk belonged to.
    pub deployment_name: Option<String>,
    /// Instance the disk was attached to.
    pub instance_name: Option<String>,
    /// Availability zone.
    pub az: Option<String>,
    /// Orphaning time, as reported.
    pub orphaned_at: Option<String>,
}

// ── Request types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DryRunQuery {
    remove_all: bool,
}

#[derive(Debug, Serialize)]
struct CleanUpRequest {
    config: CleanUpConfig,
}

#[derive(Debug, Serialize)]
struct CleanUpConfig {
    remove_all: bool,
}

impl<R: SyncOp, T: AsyncOp> Client<R, T> {
    /// Cleans up unused resources, or previews the cleanup when `dry_run`.
    ///
    /// `all` also removes orphaned disks and every unused release/stemcell
    /// instead of keeping the most recent ones.
    pub async fn clean_up(&self, all: bool, dry_run: bool) -> Result<CleanUp> {
        self.clean_up_with_cancel(all, dry_run, None).await
    }

    /// Like [`Client::clean_up`]; `cancel` aborts the wait for the cleanup
    /// task. The director-side task keeps running.
    pub async fn clean_up_with_cancel(
        &self,
        all: bool,
        dry_run: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<CleanUp> {
        if dry_run {
            self.dry_clean_up(all).await
        } else {
            self.committed_clean_up(all, cancel).await?;
            Ok(CleanUp::default())
        }
    }

    async fn dry_clean_up(&self, all: bool) -> Result<CleanUp> {
        let path = with_query(CLEANUP_DRY_RUN_PATH, &DryRunQuery { remove_all: all })?;
        self.client_request
            .get::<CleanUp>(&path)
            .await
            .wrap("Cleaning up resources")
    }

    async fn committed_clean_up(
        &self,
        all: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let request = CleanUpRequest {
            config: CleanUpConfig { remove_all: all },
        };
        let body = encode_json(CLEANUP_PATH, &request).wrap("Marshaling request body")?;

        let result = self
            .task_client_request
            .post_result(CLEANUP_PATH, body, &json_headers(), cancel)
            .await
            .wrap("Cleaning up resources")?;
        debug!(result_bytes = result.len(), "cleanup task finished");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fakes::{CallLog, FakeSync, FakeTasks};
    use reqwest::StatusCode;

    const REPORT: &str = r#"{
        "releases": [{"name": "zookeeper", "versions": ["0.0.1", "0.0.2"]}],
        "stemcells": [{"name": "ubuntu-jammy", "version": "1.1", "operating_system": "ubuntu-jammy", "cid": "ami-1"}],
        "compiled_packages": [{"name": "java", "version": "abc", "stemcell": {"os": "ubuntu-jammy", "version": "1.1"}}],
        "orphaned_disks": [{"disk_cid": "disk-1", "size": 1024, "deployment_name": "d", "instance_name": "i/0", "az": "z1", "orphaned_at": "2020-01-01T00:00:00Z"}],
        "orphaned_vms": [],
        "exported_releases": ["blob-1"],
        "dns_blobs": ["blob-2", "blob-3"]
    }"#;

    #[test]
    fn report_deserializes_every_category() {
        let report: CleanUp = serde_json::from_str(REPORT).unwrap();
        assert_eq!(report.releases[0].versions.len(), 2);
        assert_eq!(report.stemcells[0].cid.as_deref(), Some("ami-1"));
        assert_eq!(report.compiled_packages[0].stemcell.as_ref().unwrap().os, "ubuntu-jammy");
        assert_eq!(report.orphaned_disks[0].size, Some(1024));
        assert_eq!(report.exported_releases, vec!["blob-1".to_string()]);
        assert_eq!(report.dns_blobs.len(), 2);
    }

    #[test]
    fn missing_categories_default_to_empty() {
        let report: CleanUp = serde_json::from_str(r#"{"releases": []}"#).unwrap();
        assert_eq!(report, CleanUp::default());
    }

    #[tokio::test]
    async fn dry_run_reads_preview_without_starting_a_task() {
        let log = CallLog::default();
        let client = Client::new(
            FakeSync::with_responses(
                log.clone(),
                &[("/cleanup/dryrun?remove_all=true", StatusCode::OK, REPORT)],
            ),
            FakeTasks::returning(log.clone(), "{}"),
        );

        let report = client.clean_up(true, true).await.unwrap();
        assert_eq!(report.releases[0].name, "zookeeper");

        let calls = log.lock().unwrap();
        assert_eq!(calls.len(), 1, "task path must not be used for a dry run");
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].path, "/cleanup/dryrun?remove_all=true");
    }

    #[tokio::test]
    async fn committed_cleanup_posts_config_and_returns_zero_value() {
        let log = CallLog::default();
        let client = Client::new(
            FakeSync::with_responses(log.clone(), &[]),
            FakeTasks::returning(log.clone(), REPORT),
        );

        let report = client.clean_up(false, false).await.unwrap();
        assert_eq!(report, CleanUp::default(), "task payload must not leak into the result");

        let calls = log.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].path, "/cleanup");
        assert_eq!(calls[0].body.as_deref(), Some(r#"{"config":{"remove_all":false}}"#));
    }

    #[tokio::test]
    async fn dry_run_failure_is_wrapped() {
        let log = CallLog::default();
        let client = Client::new(FakeSync::with_responses(log, &[]), FakeTasks::default());
        let err = client.clean_up(false, true).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(err.to_string().starts_with("Cleaning up resources"));
    }
}

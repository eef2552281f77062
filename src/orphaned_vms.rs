//! Orphaned VMs: VMs the director still knows about but that no longer
//! belong to any deployment.
//!
//! `GET /orphaned_vms` returns the wire shape [`OrphanedVmResponse`], whose
//! `orphaned_at` is a plain string. [`Client::orphaned_vms`] maps every entry
//! into the domain type [`OrphanedVm`], parsing the timestamp on the way. One
//! bad timestamp fails the whole listing: a caller cannot act safely on a
//! partially decoded list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Result, ResultExt};
use crate::request::SyncOp;
use crate::task::AsyncOp;
use crate::time_parser::TimeParser;

const ORPHANED_VMS_PATH: &str = "/orphaned_vms";

/// An orphaned VM with its timestamp parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedVm {
    /// Cloud identifier of the VM.
    pub cid: String,
    /// Deployment the VM belonged to.
    pub deployment_name: String,
    /// Instance group name of the VM.
    pub instance_name: String,
    /// Availability zone; empty when the deployment did not use zones.
    pub az_name: String,
    /// IP addresses the VM held, in director order.
    pub ip_addresses: Vec<String>,
    /// When the VM was orphaned.
    pub orphaned_at: DateTime<Utc>,
}

/// An orphaned VM exactly as the director reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedVmResponse {
    /// Availability zone, `null` for zone-less deployments.
    #[serde(rename = "az", default)]
    pub az_name: Option<String>,
    /// Cloud identifier of the VM.
    pub cid: String,
    /// Deployment the VM belonged to.
    pub deployment_name: String,
    /// IP addresses the VM held.
    #[serde(default)]
    pub ip_addresses: Option<Vec<String>>,
    /// Instance group name.
    #[serde(default)]
    pub instance_name: Option<String>,
    /// Orphaning time in one of the director's timestamp formats.
    pub orphaned_at: String,
}

impl OrphanedVmResponse {
    /// Converts the wire entry into the domain type.
    ///
    /// # Errors
    ///
    /// `DirectorError::Parse` (wrapped with the raw value) when `orphaned_at`
    /// is not a recognized timestamp.
    pub fn into_orphaned_vm(self, parser: &TimeParser) -> Result<OrphanedVm> {
        let orphaned_at = parser
            .parse(&self.orphaned_at)
            .wrap_with(|| format!("Converting orphaned at '{}' to time", self.orphaned_at))?;

        Ok(OrphanedVm {
            cid: self.cid,
            deployment_name: self.deployment_name,
            instance_name: self.instance_name.unwrap_or_default(),
            az_name: self.az_name.unwrap_or_default(),
            ip_addresses: self.ip_addresses.unwrap_or_default(),
            orphaned_at,
        })
    }
}

impl<R: SyncOp, T: AsyncOp> Client<R, T> {
    /// Lists every orphaned VM known to the director.
    ///
    /// # Errors
    ///
    /// - `DirectorError::Endpoint` / `Transport` / `Decode` — the request failed.
    /// - `DirectorError::Parse` — an entry had an unparsable `orphaned_at`;
    ///   no VMs are returned in that case.
    pub async fn orphaned_vms(&self) -> Result<Vec<OrphanedVm>> {
        let resps = self
            .client_request
            .get::<Vec<OrphanedVmResponse>>(ORPHANED_VMS_PATH)
            .await
            .wrap("Finding orphaned VMs")?;

        resps
            .into_iter()
            .map(|r| r.into_orphaned_vm(&self.time_parser))
            .collect()
    }
}

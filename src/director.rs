//! The director façade.
//!
//! [`Director`] is the interface callers program against; [`DirectorImpl`]
//! implements it by delegating to a [`Client`]. The façade adds exactly one
//! thing on top of the client: [`Director::with_context`], which derives a
//! new, independent façade whose every request carries a correlation id.
//!
//! ```ignore
//! use director_client::{DirectorConfig, DirectorImpl, Director};
//!
//! let director = DirectorImpl::from_config(&DirectorConfig::new("https://10.0.0.6:25555"))?;
//! let traced = director.with_context("7f9c2a");
//! let report = traced.clean_up(false, true).await?;   // tagged with 7f9c2a
//! let vms = director.orphaned_vms().await?;           // untagged
//! ```

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::certificates::CertificateExpiryInfo;
use crate::cleanup::CleanUp;
use crate::client::Client;
use crate::config::DirectorConfig;
use crate::error::Result;
use crate::orphaned_vms::OrphanedVm;
use crate::request::{ClientRequest, SyncOp};
use crate::task::{AsyncOp, TaskClientRequest};

/// Operations offered by a director.
#[async_trait]
pub trait Director: Send + Sync {
    /// A new director whose requests all carry the correlation id `id`.
    /// `self` is left untouched.
    fn with_context(&self, id: &str) -> Self
    where
        Self: Sized;

    /// Lists orphaned VMs. Fails as a whole if any timestamp is unparsable.
    async fn orphaned_vms(&self) -> Result<Vec<OrphanedVm>>;

    /// Turns VM resurrection on or off for every deployment.
    async fn enable_resurrection(&self, enabled: bool) -> Result<()>;

    /// Cleans up unused resources, or previews the cleanup when `dry_run`.
    /// The committed path returns `CleanUp::default()`.
    async fn clean_up(&self, all: bool, dry_run: bool) -> Result<CleanUp>;

    /// Streams a blobstore resource into `out` without integrity checks.
    async fn download_resource_unchecked(
        &self,
        blobstore_id: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()>;

    /// Certificate expiry information; `NotSupported` on older directors.
    async fn certificate_expiry(&self) -> Result<Vec<CertificateExpiryInfo>>;
}

/// [`Director`] backed by a [`Client`].
#[derive(Debug, Clone)]
pub struct DirectorImpl<R = ClientRequest, T = TaskClientRequest> {
    client: Client<R, T>,
}

impl DirectorImpl {
    /// Builds an unscoped director from validated settings.
    pub fn from_config(config: &DirectorConfig) -> Result<Self> {
        Ok(DirectorImpl::new(Client::from_config(config)?))
    }
}

impl<R: SyncOp, T: AsyncOp> DirectorImpl<R, T> {
    /// Wraps an existing client.
    pub fn new(client: Client<R, T>) -> Self {
        DirectorImpl { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client<R, T> {
        &self.client
    }

    /// Like [`Director::clean_up`]; `cancel` aborts the wait for the task.
    pub async fn clean_up_with_cancel(
        &self,
        all: bool,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<CleanUp> {
        self.client
            .clean_up_with_cancel(all, dry_run, Some(cancel))
            .await
    }

    /// Like [`Director::download_resource_unchecked`]; `cancel` aborts the
    /// transfer.
    pub async fn download_resource_unchecked_with_cancel(
        &self,
        blobstore_id: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.client
            .download_resource_unchecked_with_cancel(blobstore_id, out, Some(cancel))
            .await
    }
}

#[async_trait]
impl<R: SyncOp, T: AsyncOp> Director for DirectorImpl<R, T> {
    fn with_context(&self, id: &str) -> Self {
        DirectorImpl {
            client: self.client.with_context(id),
        }
    }

    async fn orphaned_vms(&self) -> Result<Vec<OrphanedVm>> {
        self.client.orphaned_vms().await
    }

    async fn enable_resurrection(&self, enabled: bool) -> Result<()> {
        self.client.enable_resurrection_all(enabled).await
    }

    async fn clean_up(&self, all: bool, dry_run: bool) -> Result<CleanUp> {
        self.client.clean_up(all, dry_run).await
    }

    async fn download_resource_unchecked(
        &self,
        blobstore_id: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()> {
        self.client
            .download_resource_unchecked(blobstore_id, out)
            .await
    }

    async fn certificate_expiry(&self) -> Result<Vec<CertificateExpiryInfo>> {
        self.client.certificate_expiry().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fakes::{CallLog, FakeSync, FakeTasks};
    use reqwest::StatusCode;

    fn director(log: &CallLog) -> DirectorImpl<FakeSync, FakeTasks> {
        DirectorImpl::new(Client::new(
            FakeSync::with_responses(
                log.clone(),
                &[
                    ("/orphaned_vms", StatusCode::OK, "[]"),
                    ("/resurrection", StatusCode::OK, ""),
                ],
            ),
            FakeTasks::returning(log.clone(), ""),
        ))
    }

    #[tokio::test]
    async fn scoped_director_tags_requests_and_original_does_not() {
        let log = CallLog::default();
        let original = director(&log);
        let scoped = original.with_context("abc");

        scoped.orphaned_vms().await.unwrap();
        original.orphaned_vms().await.unwrap();
        scoped.enable_resurrection(false).await.unwrap();

        let calls = log.lock().unwrap();
        assert_eq!(calls[0].context_id.as_deref(), Some("abc"));
        assert_eq!(calls[1].context_id, None);
        assert_eq!(calls[2].context_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn deriving_twice_yields_independent_scopes() {
        let log = CallLog::default();
        let base = director(&log);
        let first = base.with_context("one");
        let second = first.with_context("two");

        first.orphaned_vms().await.unwrap();
        second.orphaned_vms().await.unwrap();

        let calls = log.lock().unwrap();
        assert_eq!(calls[0].context_id.as_deref(), Some("one"));
        assert_eq!(calls[1].context_id.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn enable_resurrection_delegates_with_inversion() {
        let log = CallLog::default();
        director(&log).enable_resurrection(true).await.unwrap();
        assert_eq!(
            log.lock().unwrap()[0].body.as_deref(),
            Some(r#"{"resurrection_paused":false}"#)
        );
    }

    #[test]
    fn director_impl_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DirectorImpl>();
    }
}

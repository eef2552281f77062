//! Raw resource download from the director blobstore.
//!
//! The body of `GET /resources/{blobstore_id}` is streamed straight into the
//! caller's writer. No checksum is verified here; integrity checking belongs
//! to whoever knows the expected digest. The id is percent-encoded as a single
//! path segment, so ids containing `/` or `?` cannot reshape the request.

use reqwest::header::HeaderMap;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::{Result, ResultExt};
use crate::request::SyncOp;
use crate::task::AsyncOp;

impl<R: SyncOp, T: AsyncOp> Client<R, T> {
    /// Streams the resource `blobstore_id` into `out` without verifying it.
    pub async fn download_resource_unchecked(
        &self,
        blobstore_id: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()> {
        self.download_resource_unchecked_with_cancel(blobstore_id, out, None)
            .await
    }

    /// Like [`Client::download_resource_unchecked`]; `cancel` aborts the
    /// transfer. Bytes already written stay in `out`.
    pub async fn download_resource_unchecked_with_cancel(
        &self,
        blobstore_id: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let path = format!("/resources/{}", urlencoding::encode(blobstore_id));

        self.client_request
            .raw_get_to(&path, out, &HeaderMap::new(), cancel)
            .await
            .wrap_with(|| format!("Downloading resource '{blobstore_id}'"))?;

        Ok(())
    }
}

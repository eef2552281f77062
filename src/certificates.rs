//! Expiry information for the director's own certificates.
//!
//! `GET /director/certificate_expiry` only exists on newer directors. A 404
//! is therefore reported as `DirectorError::NotSupported` rather than as a
//! generic endpoint failure, so callers can print "not supported" and move
//! on.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{DirectorError, Result};
use crate::request::SyncOp;
use crate::task::AsyncOp;

const CERTIFICATE_EXPIRY_PATH: &str = "/director/certificate_expiry";

/// Expiry of one certificate used by the director.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateExpiryInfo {
    /// Certificate path in the director's configuration, e.g. `director.ssl.cert`.
    pub certificate_path: String,
    /// Expiry time as reported by the director.
    pub expiry: String,
    /// Whole days until expiry; negative once expired.
    pub days_left: i64,
}

impl<R: SyncOp, T: AsyncOp> Client<R, T> {
    /// Lists expiry information for the director's certificates.
    ///
    /// # Errors
    ///
    /// - `DirectorError::NotSupported` — the director answered 404.
    /// - Any other request or decoding failure, wrapped with
    ///   `"Getting certificate expiry endpoint error"`.
    pub async fn certificate_expiry(&self) -> Result<Vec<CertificateExpiryInfo>> {
        const CONTEXT: &str = "Getting certificate expiry endpoint error";

        let resp = match self
            .client_request
            .raw_get(CERTIFICATE_EXPIRY_PATH, &HeaderMap::new())
            .await
        {
            Ok(resp) => resp,
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
                return Err(DirectorError::NotSupported {
                    operation: "Certificate expiry information".to_string(),
                    source: Box::new(err),
                });
            }
            Err(err) => return Err(err.context(CONTEXT)),
        };

        serde_json::from_slice(&resp.body).map_err(|source| {
            DirectorError::Decode {
                path: CERTIFICATE_EXPIRY_PATH.to_string(),
                source,
            }
            .context(CONTEXT)
        })
    }
}

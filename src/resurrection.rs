//! Director-wide VM resurrection toggle.
//!
//! The director phrases the setting as "paused" (`resurrection_paused`);
//! this API phrases it as "enabled". The inversion happens here and nowhere
//! else.

use serde::Serialize;

use crate::client::Client;
use crate::error::{Result, ResultExt};
use crate::request::{SyncOp, encode_json, json_headers};
use crate::task::AsyncOp;

const RESURRECTION_PATH: &str = "/resurrection";

/// Request body for `PUT /resurrection`.
#[derive(Debug, Serialize)]
struct ResurrectionRequest {
    resurrection_paused: bool,
}

impl ResurrectionRequest {
    fn enabled(enabled: bool) -> Self {
        ResurrectionRequest {
            resurrection_paused: !enabled,
        }
    }
}

impl<R: SyncOp, T: AsyncOp> Client<R, T> {
    /// Turns VM resurrection on or off for every deployment.
    pub async fn enable_resurrection_all(&self, enabled: bool) -> Result<()> {
        let body = encode_json(RESURRECTION_PATH, &ResurrectionRequest::enabled(enabled))
            .wrap("Marshaling request body")?;

        self.client_request
            .raw_put(RESURRECTION_PATH, body, &json_headers())
            .await
            .wrap("Changing VM resurrection state for all")?;

        Ok(())
    }
}

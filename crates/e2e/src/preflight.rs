//! Reachability check for the application under test

use std::time::Duration;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Issue a single GET against `url`. Any non-success status or transport
/// error means the target is unreachable.
pub async fn check_reachable(url: &str, timeout: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    info!("Checking that {} is reachable", url);

    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => Ok(()),
        Ok(resp) => {
            warn!("Preflight returned {}", resp.status());
            Err(E2eError::Unreachable {
                url: url.to_string(),
                reason: format!("status {}", resp.status()),
            })
        }
        Err(e) => Err(E2eError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        }),
    }
}

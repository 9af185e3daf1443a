//! Recurring background jobs. Call `spawn_all` once during startup.

use crate::services::PassService;
use chrono::Utc;
use std::time::Duration;

/// Detaches every job with `tokio::spawn`; does not block.
pub fn spawn_all(pass_service: PassService, pass_expiry_interval: Duration) {
    // passes past valid_until stop being offered to settlement
    {
        let svc = pass_service;
        tokio::spawn(async move {
            loop {
                match svc.expire_passes(Utc::now()).await {
                    Ok(n) if n > 0 => log::info!("Expired passes processed: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to expire passes: {e:?}"),
                }
                tokio::time::sleep(pass_expiry_interval).await;
            }
        });
    }
}

use tracing::info;

use conductor_core::errors::ConductorResult;
use conductor_core::models::{NewActivityEntry, NewMessage, NewWorker};
use conductor_core::traits::TenantHandle;

/// Worker every new tenant starts with.
pub const DEFAULT_WORKER_ID: &str = "ceo";

/// Seeds the default domain data for a freshly provisioned tenant: one idle
/// `ceo` worker, a welcome message in its inbox, and the first audit entry.
///
/// Runs after the schema flip to `active`; a failure here triggers the
/// registry's full rollback.
pub async fn seed_tenant(handle: &TenantHandle) -> ConductorResult<()> {
    let worker = handle
        .workers
        .create(&NewWorker {
            id: DEFAULT_WORKER_ID.to_string(),
            display_name: "CEO".to_string(),
            role: "ceo".to_string(),
        })
        .await?;

    handle
        .messages
        .create(&NewMessage {
            sender: "system".to_string(),
            recipient_id: worker.id.clone(),
            subject: Some("Welcome".to_string()),
            body: format!(
                "Workspace '{}' is ready. Assigned tasks will appear here.",
                handle.tenant.display_name
            ),
        })
        .await?;

    handle
        .activity
        .record(&NewActivityEntry {
            actor: "system".to_string(),
            action: "tenant.seeded".to_string(),
            detail: Some(serde_json::json!({
                "slug": handle.tenant.slug,
                "default_worker": worker.id,
            })),
        })
        .await?;

    info!(slug = %handle.tenant.slug, "seeded tenant defaults");
    Ok(())
}

//! Delivers dashboard magic links to the user who asked for one.
//!
//! The link goes out by DM; if the DM cannot be sent it is shown in an
//! ephemeral followup instead. The stored interaction is only kept when
//! nothing could be delivered, so the redelivered message can try again.

use crate::bot::BotData;
use crate::bus::BusMessage;
use crate::errors::Result;
use crate::models::InteractionHandle;
use crate::models::events::MagicLinkGenerated;
use crate::router::HandlerResult;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub const MSG_CHECK_DMS: &str = "Check your DMs for your dashboard link";

async fn send_dm(data: &BotData, user_id: &str, url: &str) -> Result<()> {
    let channel_id = data.session.user_channel_create(user_id).await?;
    data.session
        .channel_message_send(&channel_id, &format!("Here is your frolf dashboard link: {url}"), &[])
        .await?;
    Ok(())
}

async fn report_failure(data: &BotData, handle: &InteractionHandle, key: &str, reason: &str) -> HandlerResult {
    data.session
        .followup_message_create(handle, &format!("Could not create a dashboard link: {reason}"), true)
        .await?;
    data.interactions.delete(key);
    Ok(Vec::new())
}

#[instrument(skip_all, fields(correlation_id = %payload.correlation_id, user_id = %payload.user_id))]
pub async fn magic_link_generated(
    data: Arc<BotData>,
    message: BusMessage,
    payload: MagicLinkGenerated,
) -> HandlerResult {
    let key = if payload.correlation_id.is_empty() {
        message.correlation_id().unwrap_or_default().to_string()
    } else {
        payload.correlation_id.clone()
    };
    let Some(handle) = data.interactions.get(&key) else {
        warn!("No pending interaction for magic link, it may have expired");
        return Ok(Vec::new());
    };

    let url = payload.url.as_deref().filter(|u| !u.is_empty());
    let url = match (payload.success, url) {
        (true, Some(url)) => url,
        (true, None) => return report_failure(&data, &handle, &key, "no link was returned").await,
        (false, _) => {
            let reason = payload.error.as_deref().unwrap_or("unknown error");
            warn!(reason, "Magic link generation failed");
            return report_failure(&data, &handle, &key, reason).await;
        }
    };

    match send_dm(&data, &payload.user_id, url).await {
        Ok(()) => {
            // The link is delivered; a lost followup is not worth a retry.
            if let Err(e) = data
                .session
                .followup_message_create(&handle, MSG_CHECK_DMS, true)
                .await
            {
                warn!("Could not post DM notice: {}", e);
            }
            info!("Magic link sent by DM");
        }
        Err(dm_error) => {
            warn!("Could not DM magic link, falling back to ephemeral: {}", dm_error);
            let fallback = format!("I couldn't DM you. Here is your dashboard link: {url}");
            if let Err(e) = data
                .session
                .followup_message_create(&handle, &fallback, true)
                .await
            {
                error!("Could not deliver magic link at all: {}", e);
                return Err(e);
            }
        }
    }
    data.interactions.delete(&key);
    Ok(Vec::new())
}

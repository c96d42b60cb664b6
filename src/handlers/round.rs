//! Round handlers: validate Discord submissions before they reach the round
//! service, announce created rounds, and fan score events out.

use crate::bot::BotData;
use crate::bot::commands::round::rsvp_buttons;
use crate::bus::{BusMessage, keys};
use crate::errors::{ConfigError, Error};
use crate::models::events::{
    CreateRoundSubmitted, ParticipantJoinRequested, ParticipantScoreUpdated, RoundCreated,
    RoundCreationRequested, RoundEmbedScoreUpdate, RoundMessageIdUpdate, RoundScoreUpdated,
    ScoreOverrideSucceeded,
};
use crate::router::HandlerResult;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const MAX_TITLE_LEN: usize = 100;
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Problems with a submission, in the order the user should fix them.
fn validate(submitted: &CreateRoundSubmitted) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if submitted.title.trim().is_empty() {
        problems.push("a title is required");
    } else if submitted.title.chars().count() > MAX_TITLE_LEN {
        problems.push("the title is too long");
    }
    if submitted.start_time.trim().is_empty() {
        problems.push("a start time is required");
    }
    problems
}

async fn edit_pending(data: &BotData, message: &BusMessage, content: &str, done: bool) {
    let Some(correlation_id) = message.correlation_id() else {
        return;
    };
    let Some(handle) = data.interactions.get(correlation_id) else {
        return;
    };
    match data.session.interaction_response_edit(&handle, content).await {
        Ok(()) if done => data.interactions.delete(correlation_id),
        Ok(()) => {}
        Err(e) => warn!(correlation_id, "Could not update round interaction: {}", e),
    }
}

#[instrument(skip_all, fields(guild_id = %submitted.guild_id))]
pub async fn create_round_requested(
    data: Arc<BotData>,
    message: BusMessage,
    submitted: CreateRoundSubmitted,
) -> HandlerResult {
    if submitted.guild_id.is_empty() {
        return Err(Error::validation("round submission without guild"));
    }
    let problems = validate(&submitted);
    if !problems.is_empty() {
        info!(?problems, "Rejected round submission");
        let content = format!("Could not create round: {}", problems.join(", "));
        edit_pending(&data, &message, &content, true).await;
        return Ok(Vec::new());
    }

    let timezone = [
        submitted.timezone.as_str(),
        message.metadata(keys::USER_TIMEZONE).unwrap_or_default(),
    ]
    .into_iter()
    .find(|tz| !tz.trim().is_empty())
    .unwrap_or(DEFAULT_TIMEZONE)
    .to_string();

    let request = RoundCreationRequested {
        guild_id: submitted.guild_id,
        title: submitted.title,
        description: submitted.description,
        location: submitted.location,
        start_time: submitted.start_time,
        timezone,
        created_by: submitted.user_id,
        channel_id: submitted.channel_id,
    };
    edit_pending(&data, &message, &format!("Creating round **{}**...", request.title), false).await;
    Ok(vec![BusMessage::from_payload(&request)?])
}

#[instrument(skip_all, fields(guild_id = %round.guild_id, round_id = %round.round_id))]
pub async fn round_created(data: Arc<BotData>, message: BusMessage, round: RoundCreated) -> HandlerResult {
    let config = match data.resolver.get_config(&data.shutdown, &round.guild_id).await {
        Ok(config) => config,
        Err(e @ ConfigError::NotFound { .. }) => {
            warn!("Round created for a guild without config: {}", e);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    if config.event_channel_id.is_empty() {
        warn!("No events channel configured, round not announced");
        return Ok(Vec::new());
    }

    let mut content = format!("**{}**\nStarts: {}", round.title, round.start_time);
    if !round.location.is_empty() {
        content.push_str(&format!("\nLocation: {}", round.location));
    }
    content.push_str(&format!("\nCreated by <@{}>", round.created_by));

    let message_id = data
        .session
        .channel_message_send(&config.event_channel_id, &content, &rsvp_buttons(round.round_id))
        .await?;
    info!(%message_id, "Round announced");

    edit_pending(&data, &message, &format!("Round created: **{}**", round.title), true).await;

    let update = RoundMessageIdUpdate {
        round_id: round.round_id,
        guild_id: round.guild_id,
        channel_id: config.event_channel_id,
        message_id,
    };
    Ok(vec![BusMessage::from_payload(&update)?])
}

pub async fn participant_join_request(
    _data: Arc<BotData>,
    _message: BusMessage,
    request: ParticipantJoinRequested,
) -> HandlerResult {
    if request.guild_id.is_empty() || request.user_id.is_empty() {
        return Err(Error::validation("join request without guild or user"));
    }
    Ok(vec![BusMessage::from_payload(&request)?])
}

pub async fn score_updated(data: Arc<BotData>, message: BusMessage, score: RoundScoreUpdated) -> HandlerResult {
    let pick = |field: &str, key: &str| {
        if field.is_empty() {
            message.metadata(key).unwrap_or_default().to_string()
        } else {
            field.to_string()
        }
    };
    let mut channel_id = pick(&score.channel_id, keys::CHANNEL_ID);
    if channel_id.is_empty()
        && let Some(config) = data.resolver.cache().get(&score.guild_id)
    {
        channel_id = config.event_channel_id;
    }
    let message_id = pick(&score.message_id, keys::MESSAGE_ID);
    if channel_id.is_empty() || message_id.is_empty() {
        return Err(Error::validation(format!(
            "score update for round {} has no message to update",
            score.round_id
        )));
    }

    let update = RoundEmbedScoreUpdate {
        round_id: score.round_id,
        guild_id: score.guild_id,
        channel_id,
        message_id,
        user_id: score.user_id,
        score: score.score,
    };
    Ok(vec![BusMessage::from_payload(&update)?])
}

/// One participant update per overridden score.
pub async fn score_override(
    _data: Arc<BotData>,
    _message: BusMessage,
    event: ScoreOverrideSucceeded,
) -> HandlerResult {
    event
        .scores
        .iter()
        .map(|s| {
            BusMessage::from_payload(&ParticipantScoreUpdated {
                round_id: event.round_id,
                guild_id: event.guild_id.clone(),
                user_id: s.user_id.clone(),
                score: s.score,
            })
        })
        .collect()
}

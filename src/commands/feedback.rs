use tracing::info;

use super::screen_question;
use crate::feedback::{FeedbackError, FeedbackRequest};
use crate::state::Context;

/// Rate an answer; low ratings and corrections improve future answers
#[poise::command(slash_command, guild_only)]
pub async fn feedback(
    ctx: Context<'_>,
    #[description = "The question you asked"] question: String,
    #[description = "Rating from 1 (wrong) to 5 (perfect)"]
    #[min = 1]
    #[max = 5]
    rating: u8,
    #[description = "What was wrong or unclear"] comment: Option<String>,
    #[description = "The correct solution, if you know it"] correction: Option<String>,
) -> Result<(), anyhow::Error> {
    let Some(question) = screen_question(&ctx, &question).await? else {
        return Ok(());
    };
    ctx.defer_ephemeral().await?;

    info!(user = ctx.author().name, question, rating, "feedback received");

    let original = ctx.data().resolver.cached(&question).await.map(|a| a.content);
    let request = FeedbackRequest {
        question,
        original,
        rating,
        comment,
        correction,
        user_id: ctx.author().id.get(),
    };

    let reply = match ctx.data().feedback.submit(request).await {
        Ok(outcome) if outcome.patched => format!(
            "Thanks! The answer to this question has been improved and will be used from now on. (ref `{}`)",
            outcome.record_id
        ),
        Ok(outcome) => format!("Thanks for the feedback! (ref `{}`)", outcome.record_id),
        Err(e @ FeedbackError::InvalidRating(_)) => e.to_string(),
        Err(e) => return Err(e.into()),
    };

    ctx.say(reply).await?;
    Ok(())
}

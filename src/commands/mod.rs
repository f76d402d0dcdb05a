mod config;
mod documents;
mod feedback;
mod ingest;
mod solve;
mod stats;

use crate::format;
use crate::guardrails;
use crate::state::Context;

/// Math tutor: step-by-step solutions from your notes, curated problems and the web
#[poise::command(
    slash_command,
    subcommands(
        "solve::solve",
        "feedback::feedback",
        "ingest::ingest",
        "documents::documents",
        "stats::stats",
        "config::config"
    )
)]
pub async fn tutor(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Send a message in Discord-safe chunks.
/// Uses ctx.say() for all chunks; poise routes follow-ups through the
/// interaction webhook, which doesn't require Send Messages channel permission.
async fn send_chunked(ctx: &Context<'_>, text: &str) -> Result<(), anyhow::Error> {
    for piece in format::chunk(text, format::CHUNK_LIMIT) {
        ctx.say(piece).await?;
    }
    Ok(())
}

/// Run the input guardrail. A rejected question gets a private reply and
/// `None`. Answers, cache entries and patches are all keyed on the returned
/// text, so every command taking a question must go through here.
async fn screen_question(ctx: &Context<'_>, question: &str) -> Result<Option<String>, anyhow::Error> {
    match guardrails::check_input(question) {
        Ok(screened) => Ok(Some(screened)),
        Err(e) => {
            ctx.send(poise::CreateReply::default().content(e.to_string()).ephemeral(true))
                .await?;
            Ok(None)
        }
    }
}

/// Autocomplete for uploaded document titles.
async fn autocomplete_document(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let docs = ctx.data().store.list_documents(100).await.unwrap_or_default();
    let partial = partial.to_lowercase();
    docs.into_iter()
        .map(|d| d.title)
        .filter(|t| t.to_lowercase().contains(&partial))
        .take(25)
        .collect()
}

use tracing::info;

use super::{autocomplete_document, screen_question, send_chunked};
use crate::format;
use crate::guardrails;
use crate::state::Context;

/// Solve a math problem step by step
#[poise::command(slash_command, guild_only)]
pub async fn solve(
    ctx: Context<'_>,
    #[description = "Your math question"] question: String,
    #[description = "Look in this uploaded document first"]
    #[autocomplete = "autocomplete_document"]
    document: Option<String>,
    #[description = "Show resolution details (admin only)"] debug: Option<bool>,
) -> Result<(), anyhow::Error> {
    let Some(question) = screen_question(&ctx, &question).await? else {
        return Ok(());
    };

    ctx.defer().await?;

    let doc_id = match document.as_deref() {
        Some(title) => {
            let docs = ctx.data().store.list_documents(usize::MAX).await?;
            docs.into_iter()
                .find(|d| d.title == title || d.id.starts_with(title))
                .map(|d| d.id)
        }
        None => None,
    };

    info!(user = ctx.author().name, question, document = ?document, "solve started");

    let mut resolution = ctx.data().resolver.solve(&question, doc_id.as_deref()).await;
    if !resolution.is_failure() {
        resolution.answer.content = guardrails::check_output(&resolution.answer.content);
    }

    let mut full = format::render(&question, &resolution);
    if !resolution.is_failure() {
        full.push_str("\n\n*Was this helpful? Rate it with `/tutor feedback`.*");
    }

    let show_debug = debug.unwrap_or(false) && ctx.data().is_admin(ctx.author().id.get());
    if show_debug {
        full.push_str(&format!(
            "\n\n---\n**[Debug]** stage `{}` · source `{}` · {} ms · target {}",
            resolution.stage,
            resolution.answer.source,
            resolution.elapsed.as_millis(),
            if resolution.target_met { "met" } else { "missed" }
        ));
    }

    send_chunked(&ctx, &full).await
}

use super::send_chunked;
use crate::state::Context;

/// List uploaded study documents
#[poise::command(slash_command, guild_only)]
pub async fn documents(
    ctx: Context<'_>,
    #[description = "Max documents to show"] limit: Option<u32>,
) -> Result<(), anyhow::Error> {
    let limit = limit.unwrap_or(20) as usize;
    let docs = ctx.data().store.list_documents(limit).await?;

    if docs.is_empty() {
        ctx.say("No documents uploaded yet. Use `/tutor ingest` to add some.")
            .await?;
        return Ok(());
    }

    let mut output = String::from("**Study Documents**\n\n");
    for doc in &docs {
        let added = chrono::DateTime::from_timestamp(doc.ingested_at, 0)
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        output.push_str(&format!(
            "- **{}** ({} KB, {}) `{}`\n  Source: {}\n",
            doc.title,
            doc.size.div_ceil(1024),
            added,
            &doc.id[..12],
            doc.origin
        ));
    }

    send_chunked(&ctx, &output).await
}

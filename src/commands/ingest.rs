use tracing::info;

use crate::state::Context;
use crate::store::ingest as doc_ingest;

/// Upload study material from a URL (web page or text file)
#[poise::command(slash_command, guild_only)]
pub async fn ingest(
    ctx: Context<'_>,
    #[description = "URL of the page or file"] url: String,
    #[description = "Title to show for this document"] title: Option<String>,
) -> Result<(), anyhow::Error> {
    ctx.defer().await?;

    info!(user = ctx.author().name, url, "Ingestion started");

    let store = &ctx.data().store;
    let (doc_id, size) = match doc_ingest::ingest_url(store, &url, title.as_deref()).await {
        Ok(done) => done,
        Err(e) => {
            ctx.say(format!("Could not ingest `{}`: {:#}", url, e)).await?;
            return Ok(());
        }
    };
    let meta = store.get_meta(&doc_id).await?;

    ctx.say(format!(
        "Ingested **{}** ({} KB)\nDoc ID: `{}`\nPick it with the `document` option of `/tutor solve`.",
        meta.title,
        size.div_ceil(1024),
        &doc_id[..12]
    ))
    .await?;

    Ok(())
}

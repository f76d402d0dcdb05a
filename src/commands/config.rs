use tracing::info;

use crate::state::{Context, TutorConfig};

/// Configure resolver parameters (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "fast_deadline_ms | search_deadline_ms | response_target_ms | min_confidence_pct | patch_rating_threshold"]
    param: Option<String>,
    #[description = "New value"] value: Option<u64>,
) -> Result<(), anyhow::Error> {
    let user_id = ctx.author().id.get();
    if !ctx.data().is_admin(user_id) {
        ctx.say("This command is admin-only.").await?;
        return Ok(());
    }

    match (param.as_deref(), value) {
        (None, _) => {
            let config = ctx.data().config.read().await;
            ctx.say(format!(
                "**Tutor Configuration:**\n\
                 `fast_deadline_ms`: {}\n\
                 `search_deadline_ms`: {}\n\
                 `response_target_ms`: {}\n\
                 `min_confidence_pct`: {:.0}\n\
                 `patch_rating_threshold`: {}\n\
                 cache: {} entries, {}s TTL (restart to change)",
                config.fast_deadline_ms,
                config.search_deadline_ms,
                config.response_target_ms,
                config.min_confidence * 100.0,
                config.patch_rating_threshold,
                config.cache_capacity,
                config.cache_ttl_secs
            ))
            .await?;
        }
        (Some(key), Some(val)) => {
            let result = ctx.data().config.write().await.set(key, val);
            match result {
                Ok(()) => {
                    info!(user_id, param = key, value = val, "config updated");
                    ctx.say(format!("`{}` set to {}", key, val)).await?;
                }
                Err(msg) => {
                    ctx.say(msg).await?;
                }
            }
        }
        (Some(_), None) => {
            ctx.say(format!(
                "Provide both `param` and `value`. Example: `/tutor config search_deadline_ms 4000`\nValid: {}",
                TutorConfig::PARAMS.join(", ")
            ))
            .await?;
        }
    }

    Ok(())
}

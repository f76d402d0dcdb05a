mod cache;
mod commands;
mod feedback;
mod format;
mod guardrails;
mod llm;
mod resolve;
mod sources;
mod state;
mod store;
mod text;

#[cfg(test)]
mod testing;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use poise::serenity_prelude as serenity;
use poise::{Framework, FrameworkOptions};
use tokio::sync::RwLock;
use tracing::{error, info, warn, Level};

use cache::{AnswerCache, MemoryCache};
use feedback::FeedbackService;
use llm::LlmClient;
use resolve::{Resolver, SourceSet};
use sources::bank::{CuratedBank, CuratedBankAdapter};
use sources::document::DocumentAdapter;
use sources::formula::FormulaAdapter;
use sources::generative::GenerativeAdapter;
use sources::vector::{VectorDatasetAdapter, VectorIndex};
use sources::web::WebSearchAdapter;
use sources::SourceAdapter;
use state::{AppState, TutorConfig};
use store::TutorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load env
    let _ = dotenv::dotenv();

    let level = dotenv::var("TUTOR_LOG_LEVEL")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let token = dotenv::var("DISCORD_TOKEN").expect("DISCORD_TOKEN required");
    let guild_id: Option<serenity::GuildId> = dotenv::var("DISCORD_GUILD_ID")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(serenity::GuildId::new);

    // Init storage
    let data_dir = PathBuf::from(dotenv::var("TUTOR_DATA_DIR").unwrap_or_else(|_| "./data/store".to_string()));
    let store = Arc::new(TutorStore::new(&data_dir).await?);
    info!("Tutor store initialized at {:?}", data_dir);

    // Problem sources
    let bank_path = dotenv::var("TUTOR_BANK_PATH").ok().map(PathBuf::from);
    let bank = Arc::new(CuratedBank::load(bank_path.as_deref())?);
    let dataset_path = dotenv::var("TUTOR_DATASET_PATH").ok().map(PathBuf::from);
    let index = Arc::new(VectorIndex::load(dataset_path.as_deref())?);
    info!(bank = bank.len(), dataset = index.len(), "problem sources loaded");
    if bank.is_empty() {
        warn!("Curated bank is empty; bank lookups will always miss");
    }
    if index.is_empty() {
        warn!("No vector dataset loaded (set TUTOR_DATASET_PATH to enable dataset search)");
    }

    let llm_client = Arc::new(LlmClient::from_env()?);
    info!(model = llm_client.model(), "LLM client initialized");

    let config = TutorConfig::from_env();
    let cache: Arc<dyn AnswerCache> = Arc::new(MemoryCache::new(config.cache_capacity, config.cache_ttl()));
    let config = Arc::new(RwLock::new(config));

    let generative: Arc<dyn SourceAdapter> = Arc::new(GenerativeAdapter::new(llm_client));
    let sources = SourceSet {
        fast_local: vec![
            Arc::new(DocumentAdapter::new(store.clone())) as Arc<dyn SourceAdapter>,
            Arc::new(FormulaAdapter),
        ],
        broad_search: vec![
            Arc::new(CuratedBankAdapter::new(bank)) as Arc<dyn SourceAdapter>,
            Arc::new(VectorDatasetAdapter::new(index)),
            Arc::new(WebSearchAdapter::from_env()?),
        ],
        generative: generative.clone(),
    };

    let resolver = Arc::new(Resolver::new(sources, store.clone(), cache.clone(), config.clone()));
    let feedback = Arc::new(FeedbackService::new(
        store.clone(),
        store.clone(),
        cache,
        generative,
        config.clone(),
    ));

    // Parse admin user IDs from env
    let admin_ids: HashSet<u64> = dotenv::var("ADMIN_USER_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect();
    if !admin_ids.is_empty() {
        info!(count = admin_ids.len(), "Admin users configured");
    }

    let app_state = AppState {
        store,
        resolver,
        feedback,
        admin_ids,
        config,
    };

    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGES;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![commands::tutor()],
            on_error: |err| {
                Box::pin(async move {
                    if let poise::FrameworkError::Command { error, ctx, .. } = err {
                        error!(command = %ctx.command().qualified_name, error = %error, "command failed");
                        let _ = ctx.say("Something went wrong while handling that. Please try again.").await;
                    } else if let Err(e) = poise::builtins::on_error(err).await {
                        error!("Error while handling error: {}", e);
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as: {} ({})", ready.user.name, ready.user.id);

                let commands = &framework.options().commands;
                for cmd in commands {
                    info!("  /{} ({} subcommands)", cmd.name, cmd.subcommands.len());
                    for sub in &cmd.subcommands {
                        info!("    /{} {}", cmd.name, sub.name);
                    }
                }

                if let Some(gid) = guild_id {
                    info!("Registering to guild {} (instant)", gid);
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, gid).await?;
                } else {
                    info!("Registering globally (up to 1 hour delay)");
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                }

                Ok(app_state)
            })
        })
        .build();

    info!("Starting math tutor bot...");

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }

    Ok(())
}

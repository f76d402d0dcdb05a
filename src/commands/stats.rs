use crate::state::Context;

/// Feedback and response-time statistics
#[poise::command(slash_command, guild_only)]
pub async fn stats(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let stats = ctx.data().feedback.stats().await?;
    let perf = ctx.data().resolver.performance();
    let target_ms = ctx.data().config.read().await.response_target_ms;

    let mut output = String::from("**Feedback**\n");
    if stats.total == 0 {
        output.push_str("No feedback yet.\n");
    } else {
        output.push_str(&format!(
            "Total: {}\nAverage rating: {:.2} / 5\nImproved answers: {}\n",
            stats.total, stats.average_rating, stats.patches
        ));
        let widest = stats.distribution.iter().copied().max().unwrap_or(1).max(1);
        for (i, count) in stats.distribution.iter().enumerate().rev() {
            let bar = "█".repeat(count * 10 / widest);
            output.push_str(&format!("`{}★` {} {}\n", i + 1, bar, count));
        }
    }

    output.push_str("\n**Performance** (since start-up)\n");
    if perf.total == 0 {
        output.push_str("No questions answered yet.");
    } else {
        output.push_str(&format!(
            "Answered: {}\nMean: {:.2}s · Max: {:.2}s\nOver the {:.1}s target: {}\n",
            perf.total,
            perf.mean_elapsed.as_secs_f64(),
            perf.max_elapsed.as_secs_f64(),
            target_ms as f64 / 1000.0,
            perf.target_misses
        ));
        let stages: Vec<String> = perf
            .by_stage
            .iter()
            .map(|(stage, count)| format!("{} {}", stage, count))
            .collect();
        output.push_str(&format!("By stage: {}\n", stages.join(" · ")));
        output.push_str("Slowest:\n");
        for slow in &perf.slowest {
            output.push_str(&format!(
                "- `{}` {} {:.2}s\n",
                &slow.fingerprint.as_str()[..12],
                slow.stage,
                slow.elapsed.as_secs_f64()
            ));
        }
    }

    ctx.say(output.trim_end()).await?;
    Ok(())
}

//! `hi`: answers "hi" in groups and greets the main owner every morning.

use {
    crate::{
        context::PluginContext,
        plugin::{Plugin, Teardown, teardown},
    },
    async_trait::async_trait,
    tracing::info,
};

/// Every day at 09:00 in the configured timezone.
const MORNING: &str = "0 9 * * *";

pub struct HiPlugin;

#[async_trait]
impl Plugin for HiPlugin {
    fn name(&self) -> &str {
        "hi"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn description(&self) -> &str {
        "A simple hi plugin"
    }

    async fn setup(&self, ctx: &PluginContext) -> anyhow::Result<Option<Teardown>> {
        info!(self_id = ?ctx.self_id(), "hi plugin loaded");

        ctx.handle("message.group", |event| async move {
            if let Some(message) = event.as_message()
                && message.text() == "hi"
            {
                message.reply("hi from plugin!", false).await?;
            }
            Ok(())
        });

        ctx.cron(MORNING, |ctx, _tick| async move {
            ctx.notice_main_owner("hi from cron task!").await;
            Ok(())
        })?;

        Ok(Some(teardown(|| async {
            info!("hi plugin unloaded");
            Ok(())
        })))
    }
}

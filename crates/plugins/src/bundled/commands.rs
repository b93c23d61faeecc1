//! `core` builtin: operator commands for the running bridge.
//!
//! - `<prefix>status`: uptime, per-connection traffic and plugin count
//! - `<prefix>plugins`: active plugins with version and priority

use {
    crate::{
        context::PluginContext,
        plugin::{Plugin, Teardown},
    },
    async_trait::async_trait,
    onebridge_client::{Event, MessageEvent},
    std::{sync::atomic::Ordering, time::Duration},
    tracing::debug,
};

pub struct CorePlugin;

#[async_trait]
impl Plugin for CorePlugin {
    fn name(&self) -> &str {
        "core"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn priority(&self) -> i32 {
        0
    }

    fn description(&self) -> &str {
        "Status and plugin commands for owners"
    }

    async fn setup(&self, ctx: &PluginContext) -> anyhow::Result<Option<Teardown>> {
        let handler_ctx = ctx.clone();
        ctx.handle("message", move |event| {
            let ctx = handler_ctx.clone();
            async move {
                let Some(message) = event.as_message() else {
                    return Ok(());
                };
                let Some(reply) = command_reply(&ctx, &event, message) else {
                    return Ok(());
                };
                message.reply(reply, true).await?;
                Ok(())
            }
        });
        Ok(None)
    }
}

fn command_reply(ctx: &PluginContext, event: &Event, message: &MessageEvent) -> Option<String> {
    let text = message.text();
    let command = text.strip_prefix(ctx.config().prefix.as_str())?.trim();
    if !matches!(command, "status" | "plugins") {
        return None;
    }
    if !ctx.config().is_owner(message.user_id, event.self_id()) {
        debug!(user_id = message.user_id, command, "ignoring command from non-owner");
        return None;
    }
    Some(match command {
        "status" => status(ctx),
        _ => plugins(ctx),
    })
}

fn status(ctx: &PluginContext) -> String {
    let mut lines = vec![
        format!("onebridge v{}", env!("CARGO_PKG_VERSION")),
        format!("uptime: {}", format_uptime(ctx.uptime())),
        "bots:".to_string(),
    ];
    for bot in ctx.bots() {
        let stats = bot.stats();
        lines.push(format!(
            "- {} ({}): sent {} / received {}",
            bot.nickname().unwrap_or(bot.label()),
            bot.self_id().map(|id| id.to_string()).unwrap_or_else(|| "?".into()),
            stats.sent.load(Ordering::Relaxed),
            stats.received.load(Ordering::Relaxed),
        ));
    }
    lines.push(format!(
        "plugins: {} active, {} configured",
        ctx.active_plugins().len(),
        ctx.config().plugins.len()
    ));
    lines.join("\n")
}

fn plugins(ctx: &PluginContext) -> String {
    let active = ctx.active_plugins();
    if active.is_empty() {
        return "no active plugins".into();
    }
    active
        .iter()
        .map(|p| {
            format!(
                "{} v{} [{}] priority {}",
                p.descriptor.name, p.descriptor.version, p.kind, p.descriptor.priority
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, rest) = (secs / 86_400, secs % 86_400);
    format!(
        "{days}d {:02}:{:02}:{:02}",
        rest / 3_600,
        rest % 3_600 / 60,
        rest % 60
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            host::{PluginHost, testing::*},
            plugin::PluginKind,
        },
        rstest::rstest,
        serde_json::json,
        std::sync::Arc,
    };

    #[rstest]
    #[case(0, "0d 00:00:00")]
    #[case(59, "0d 00:00:59")]
    #[case(3_661, "0d 01:01:01")]
    #[case(90_061, "1d 01:01:01")]
    fn uptime_format(#[case] secs: u64, #[case] expected: &str) {
        assert_eq!(format_uptime(Duration::from_secs(secs)), expected);
    }

    fn private_frame(user_id: i64, text: &str) -> String {
        json!({
            "post_type": "message",
            "message_type": "private",
            "sub_type": "friend",
            "self_id": 1001,
            "user_id": user_id,
            "time": 1,
            "message_id": 77,
            "raw_message": text,
            "message": text
        })
        .to_string()
    }

    fn reply_texts(calls: &[onebridge_protocol::OutboundCall]) -> Vec<String> {
        calls
            .iter()
            .map(|c| {
                c.params["message"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter(|s| s["type"] == "text")
                    .map(|s| s["data"]["text"].as_str().unwrap().to_string())
                    .collect()
            })
            .collect()
    }

    #[tokio::test]
    async fn owner_commands_reply() {
        let (a, rx) = bot(1001);
        let calls = respond_ok(&a, rx);
        let bots = vec![Arc::clone(&a)];
        let host = PluginHost::new(test_config());
        host.enable(&bots, Arc::new(CorePlugin), PluginKind::Builtin)
            .await
            .unwrap();

        a.handle_frame(&private_frame(1, "#status")).await;
        a.handle_frame(&private_frame(1, "#plugins")).await;
        a.handle_frame(&private_frame(3, "#status")).await;
        a.handle_frame(&private_frame(1, "status")).await;

        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.action == "send_private_msg"));
        assert_eq!(calls[0].params["message"][0]["type"], "reply");

        let texts = reply_texts(&calls);
        assert!(texts[0].contains("uptime: 0d"));
        assert!(texts[0].contains("- bot1001 (1001): sent 0 / received 1"));
        assert!(texts[0].contains("plugins: 1 active, 0 configured"));
        assert_eq!(texts[1], format!("core v{} [builtin] priority 0", env!("CARGO_PKG_VERSION")));
    }
}

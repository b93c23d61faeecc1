//! The `run` command: connect, start plugins, wait for Ctrl-C, shut down.

use {
    anyhow::{Context, bail},
    onebridge_client::{BotRegistry, Connection, Endpoint},
    onebridge_config::{BotConfig, BridgeConfig},
    onebridge_plugins::{LoadReport, PluginContext, PluginHost, bundled},
    std::sync::Arc,
    tokio::task::JoinHandle,
    tracing::{info, warn},
};

pub async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let endpoints: Vec<Endpoint> = config.bots.iter().map(endpoint).collect();
    let registry = BotRegistry::new();

    let (bots, connect_failures) = registry.connect_all(&endpoints).await;
    if bots.is_empty() {
        bail!(
            "none of the {} configured bridge endpoint(s) could be reached",
            endpoints.len()
        );
    }
    let connect_failures: Vec<(String, String)> = connect_failures
        .into_iter()
        .map(|(name, e)| (name, e.to_string()))
        .collect();

    let host = PluginHost::new(config.clone());
    let report = host
        .start(&bots, bundled::builtins(), &bundled::loader(), &config.plugins)
        .await;

    let notifier = host
        .detached_context("onebridge", &bots)
        .context("no connection to send notifications through")?;
    if let Some(notice) = startup_notice(&connect_failures, &report) {
        notifier.notice_main_owner(notice).await;
    }
    if config.online_push {
        notifier
            .notice_main_owner(online_notice(&bots, &report))
            .await;
    }

    let watchers = watch_connections(&notifier, &bots);

    info!(
        bots = bots.len(),
        plugins = report.loaded.len(),
        "onebridge ready"
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutting down");
        },
        () = all_closed(&bots) => warn!("every bridge connection closed"),
    }

    for watcher in watchers {
        watcher.abort();
    }
    for e in host.shutdown().await {
        warn!(error = %e, "plugin shutdown failure");
    }
    registry.close_all();
    Ok(())
}

fn endpoint(bot: &BotConfig) -> Endpoint {
    Endpoint::new(bot.label(), bot.endpoint_url()).with_token(bot.token.clone())
}

async fn all_closed(bots: &[Arc<Connection>]) {
    futures::future::join_all(bots.iter().map(|b| b.closed())).await;
}

/// Tell the main owner about each connection that drops, through one that
/// is still up.
fn watch_connections(notifier: &PluginContext, bots: &[Arc<Connection>]) -> Vec<JoinHandle<()>> {
    bots.iter()
        .map(|bot| {
            let bot = Arc::clone(bot);
            let notifier = notifier.clone();
            tokio::spawn(async move {
                bot.closed().await;
                let remaining = notifier.bots().iter().filter(|b| b.is_open()).count();
                warn!(conn = %bot.label(), self_id = ?bot.self_id(), remaining, "bridge connection lost");
                if remaining > 0 {
                    notifier
                        .notice_main_owner(connection_lost_notice(&bot, remaining))
                        .await;
                }
            })
        })
        .collect()
}

fn connection_lost_notice(bot: &Connection, remaining: usize) -> String {
    format!(
        "bridge connection {} ({}) lost, {remaining} still connected",
        bot.nickname().unwrap_or(bot.label()),
        bot.self_id().unwrap_or_default()
    )
}

/// Message for the main owner when something failed to come up.
fn startup_notice(connect_failures: &[(String, String)], report: &LoadReport) -> Option<String> {
    if connect_failures.is_empty() && report.failed.is_empty() && report.warnings.is_empty() {
        return None;
    }
    let mut lines = Vec::new();
    if !connect_failures.is_empty() {
        lines.push(format!("{} bridge(s) unreachable:", connect_failures.len()));
        lines.extend(
            connect_failures
                .iter()
                .map(|(name, error)| format!("- {name}: {error}")),
        );
    }
    if !report.failed.is_empty() {
        lines.push(report.summary());
    }
    lines.extend(report.warnings.iter().map(|w| format!("warning: {w}")));
    Some(lines.join("\n"))
}

fn online_notice(bots: &[Arc<Connection>], report: &LoadReport) -> String {
    let accounts: Vec<String> = bots
        .iter()
        .map(|b| {
            format!(
                "{} ({})",
                b.nickname().unwrap_or(b.label()),
                b.self_id().unwrap_or_default()
            )
        })
        .collect();
    format!(
        "onebridge v{} online\nbots: {}\nplugins: {} loaded in {}ms",
        env!("CARGO_PKG_VERSION"),
        accounts.join(", "),
        report.loaded.len(),
        report.elapsed.as_millis()
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        onebridge_client::LoginInfo,
        onebridge_config::WsProtocol,
        onebridge_plugins::LoadFailure,
        serde_json::{Value, json},
        tokio::sync::mpsc,
    };

    fn connected(nickname: &str, self_id: i64) -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
        let (conn, rx) = Connection::in_memory(format!("bridge-{self_id}"));
        conn.assume_identity(LoginInfo {
            user_id: self_id,
            nickname: nickname.into(),
        });
        (conn, rx)
    }

    #[tokio::test]
    async fn lost_connection_is_reported_through_a_survivor() {
        let (a, _ra) = connected("alpha", 1001);
        let (b, mut rb) = connected("beta", 1002);
        let bots = vec![Arc::clone(&a), Arc::clone(&b)];
        let host = PluginHost::new(BridgeConfig {
            owners: vec![7],
            ..BridgeConfig::default()
        });
        let notifier = host.detached_context("onebridge", &bots).unwrap();
        let watchers = watch_connections(&notifier, &bots);

        a.close();
        let call: Value = serde_json::from_str(&rb.recv().await.unwrap()).unwrap();
        assert_eq!(call["action"], "send_private_msg");
        assert_eq!(call["params"]["user_id"], 7);
        assert_eq!(
            call["params"]["message"][0]["data"]["text"],
            "bridge connection alpha (1001) lost, 1 still connected"
        );
        b.ingest(&json!({ "echo": call["echo"], "retcode": 0, "data": { "message_id": 1 } }).to_string());

        for watcher in watchers {
            watcher.abort();
        }
        b.close();
        assert!(rb.try_recv().is_err());
    }

    #[test]
    fn name_mismatch_reaches_the_owner() {
        let report = LoadReport {
            warnings: vec!["plugin listed as 'greeter' declares the name 'hello'".into()],
            ..LoadReport::default()
        };
        assert_eq!(
            startup_notice(&[], &report).unwrap(),
            "warning: plugin listed as 'greeter' declares the name 'hello'"
        );
    }

    #[test]
    fn endpoint_carries_label_url_and_token() {
        let bot: BotConfig = serde_json::from_value(serde_json::json!({
            "name": "main",
            "protocol": "wss",
            "host": "bridge.example",
            "port": 443,
            "token": "t0k"
        }))
        .unwrap();
        assert_eq!(bot.protocol, WsProtocol::Wss);

        let ep = endpoint(&bot);
        assert_eq!(ep.name, "main");
        assert_eq!(ep.request_url(), "wss://bridge.example:443?access_token=t0k");
    }

    #[test]
    fn no_notice_when_everything_started() {
        assert!(startup_notice(&[], &LoadReport::default()).is_none());
    }

    #[test]
    fn notice_lists_every_failure() {
        let report = LoadReport {
            failed: vec![LoadFailure {
                name: "weather".into(),
                error: "cannot load plugin 'weather': no such plugin".into(),
            }],
            ..LoadReport::default()
        };
        let notice = startup_notice(
            &[("10.0.0.2:3001".into(), "connection refused".into())],
            &report,
        )
        .unwrap();
        assert_eq!(
            notice,
            "1 bridge(s) unreachable:\n\
             - 10.0.0.2:3001: connection refused\n\
             0 plugin(s) loaded, 1 failed in 0ms\n\
             - weather: cannot load plugin 'weather': no such plugin"
        );
    }
}

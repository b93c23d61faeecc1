use {
    onebridge_config::BridgeConfig,
    onebridge_plugins::{Plugin, PluginDescriptor, PluginKind, PluginLoader, bundled},
    serde_json::{Value, json},
};

struct Row {
    descriptor: PluginDescriptor,
    kind: PluginKind,
    enabled: bool,
}

fn rows(config: &BridgeConfig) -> Vec<Row> {
    let builtins = bundled::builtins().into_iter().map(|p| Row {
        descriptor: PluginDescriptor::of(p.as_ref()),
        kind: PluginKind::Builtin,
        enabled: true,
    });
    let loader = bundled::loader();
    let external = loader.available().into_iter().filter_map(|id| {
        let plugin: std::sync::Arc<dyn Plugin> = loader.load(&id).ok()?;
        Some(Row {
            descriptor: PluginDescriptor::of(plugin.as_ref()),
            kind: PluginKind::External,
            enabled: config.is_plugin_enabled(&id),
        })
    });
    builtins.chain(external).collect()
}

pub fn list(config: &BridgeConfig, json: bool) -> anyhow::Result<()> {
    let rows = rows(config);
    if json {
        let entries: Vec<Value> = rows
            .iter()
            .map(|r| {
                json!({
                    "name": r.descriptor.name,
                    "version": r.descriptor.version,
                    "priority": r.descriptor.priority,
                    "description": r.descriptor.description,
                    "kind": r.kind,
                    "enabled": r.enabled,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for r in &rows {
        let status = if r.enabled {
            "✓"
        } else {
            "✗"
        };
        println!(
            "  {status} {name} v{version} [{kind}, priority {priority}]: {desc}",
            name = r.descriptor.name,
            version = r.descriptor.version,
            kind = r.kind,
            priority = r.descriptor.priority,
            desc = r.descriptor.description,
        );
    }
    Ok(())
}

use std::path::{Path, PathBuf};

use {anyhow::Context, tracing::debug};

use crate::{env_subst::substitute_env, schema::BridgeConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "onebridge.toml",
    "onebridge.yaml",
    "onebridge.yml",
    "onebridge.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./onebridge.{toml,yaml,yml,json}`
/// 2. `<user config dir>/onebridge.{toml,yaml,yml,json}`
///
/// Returns `BridgeConfig::default()` if no config file is found. A file that
/// is found but cannot be read or parsed is an error.
pub fn discover_and_load() -> anyhow::Result<(BridgeConfig, Option<PathBuf>)> {
    load_found(find_config_file())
}

fn load_found(found: Option<PathBuf>) -> anyhow::Result<(BridgeConfig, Option<PathBuf>)> {
    let Some(path) = found else {
        debug!("no config file found, using defaults");
        return Ok((BridgeConfig::default(), None));
    };
    debug!(path = %path.display(), "loading config");
    let config =
        load_config(&path).with_context(|| format!("invalid config file {}", path.display()))?;
    Ok((config, Some(path)))
}

/// First config file in the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    find_in(Path::new("."))
        .or_else(|| config_dir().and_then(|dir| find_in(&dir)))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// User-global config directory (`~/.config/onebridge/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "onebridge").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<BridgeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_each_format() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("onebridge.toml");
        std::fs::write(&toml_path, "prefix = \"!\"\nowners = [1]\n").unwrap();
        let cfg = load_config(&toml_path).unwrap();
        assert_eq!(cfg.prefix, "!");
        assert_eq!(cfg.owners, [1]);

        let yaml_path = dir.path().join("onebridge.yaml");
        std::fs::write(&yaml_path, "plugins: [hi]\nbots:\n  - host: 10.0.0.1\n    port: 6700\n").unwrap();
        let cfg = load_config(&yaml_path).unwrap();
        assert_eq!(cfg.plugins, ["hi"]);
        assert_eq!(cfg.bots[0].endpoint_url(), "ws://10.0.0.1:6700");

        let json_path = dir.path().join("onebridge.json");
        std::fs::write(&json_path, r#"{"admins":[5],"online_push":true}"#).unwrap();
        let cfg = load_config(&json_path).unwrap();
        assert_eq!(cfg.admins, [5]);
        assert!(cfg.online_push);
    }

    #[test]
    fn substitutes_env_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onebridge.toml");
        std::fs::write(
            &path,
            "[[bots]]\nhost = \"${ONEBRIDGE_LOADER_UNSET_HOST:-bridge.local}\"\ntoken = \"${ONEBRIDGE_LOADER_UNSET_TOKEN:-t0k}\"\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.bots[0].host, "bridge.local");
        assert_eq!(cfg.bots[0].token.as_ref().unwrap().expose_secret(), "t0k");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onebridge.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn broken_discovered_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("onebridge.toml"), "this is [[ not toml").unwrap();

        let err = load_found(find_in(dir.path())).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config file"));
        assert!(err.to_string().contains("onebridge.toml"));
    }

    #[test]
    fn nothing_found_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, path) = load_found(find_in(dir.path())).unwrap();
        assert!(path.is_none());
        assert_eq!(config.prefix, "#");
    }

    #[test]
    fn finds_first_matching_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("onebridge.json"), "{}").unwrap();
        std::fs::write(dir.path().join("onebridge.yaml"), "{}").unwrap();
        let found = find_in(dir.path()).unwrap();
        assert!(found.ends_with("onebridge.yaml"));
    }
}

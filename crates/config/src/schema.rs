//! Config schema.

use {
    onebridge_protocol::{DEFAULT_HOST, DEFAULT_PORT},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Command prefix for built-in commands (e.g. `#status`).
    pub prefix: String,
    /// Account ids with full control.
    pub owners: Vec<i64>,
    /// Account ids with elevated rights. Owners are not admins.
    pub admins: Vec<i64>,
    /// User plugins to enable at startup, by name.
    pub plugins: Vec<String>,
    /// Send the main owner a message once startup finishes.
    pub online_push: bool,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: Option<String>,
    /// IANA zone for plugin cron schedules, e.g. `Asia/Shanghai`. Local time
    /// when unset.
    pub timezone: Option<String>,
    /// Bridge endpoints, one per bot account.
    pub bots: Vec<BotConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            prefix: "#".into(),
            owners: Vec::new(),
            admins: Vec::new(),
            plugins: Vec::new(),
            online_push: false,
            log_level: None,
            timezone: None,
            bots: vec![BotConfig::default()],
        }
    }
}

impl BridgeConfig {
    pub fn main_owner(&self) -> Option<i64> {
        self.owners.first().copied()
    }

    /// Owners, plus `self_id` (the bot account itself) when given.
    pub fn is_owner(&self, user_id: i64, self_id: Option<i64>) -> bool {
        self_id == Some(user_id) || self.owners.contains(&user_id)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    /// Owner or admin.
    pub fn has_right(&self, user_id: i64, self_id: Option<i64>) -> bool {
        self.is_owner(user_id, self_id) || self.is_admin(user_id)
    }

    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WsProtocol {
    #[default]
    Ws,
    Wss,
}

impl fmt::Display for WsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ws => f.write_str("ws"),
            Self::Wss => f.write_str("wss"),
        }
    }
}

/// One bridge endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Label used in logs; defaults to `host:port`.
    pub name: Option<String>,
    pub protocol: WsProtocol,
    pub host: String,
    pub port: u16,
    /// Optional path component, e.g. `/onebot`.
    pub path: Option<String>,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: None,
            protocol: WsProtocol::default(),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            path: None,
            token: None,
        }
    }
}

impl BotConfig {
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }

    /// `ws://host:port[/path]`, without the access token.
    pub fn endpoint_url(&self) -> String {
        let path = self
            .path
            .as_deref()
            .map(|p| p.trim_start_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| format!("/{p}"))
            .unwrap_or_default();
        format!("{}://{}:{}{path}", self.protocol, self.host, self.port)
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_bridge() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.prefix, "#");
        assert_eq!(cfg.bots.len(), 1);
        assert_eq!(cfg.bots[0].endpoint_url(), "ws://localhost:3333");
    }

    #[test]
    fn endpoint_url_includes_path() {
        let bot = BotConfig {
            protocol: WsProtocol::Wss,
            host: "bridge.example".into(),
            port: 443,
            path: Some("/onebot".into()),
            ..BotConfig::default()
        };
        assert_eq!(bot.endpoint_url(), "wss://bridge.example:443/onebot");
        assert_eq!(bot.label(), "bridge.example:443");
    }

    #[test]
    fn owner_and_admin_rights() {
        let cfg = BridgeConfig {
            owners: vec![1],
            admins: vec![2],
            ..BridgeConfig::default()
        };
        assert!(cfg.is_owner(1, None));
        assert!(cfg.is_owner(99, Some(99)));
        assert!(!cfg.is_owner(2, None));
        assert!(cfg.is_admin(2));
        assert!(!cfg.is_admin(1));
        assert!(cfg.has_right(2, None));
        assert!(!cfg.has_right(3, Some(99)));
        assert_eq!(cfg.main_owner(), Some(1));
    }

    #[test]
    fn token_round_trips_through_toml() {
        let cfg: BridgeConfig = toml::from_str(
            r#"
            owners = [10]
            [[bots]]
            host = "10.0.0.2"
            port = 6700
            token = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bots[0].token.as_ref().unwrap().expose_secret(), "abc");
        let text = toml::to_string(&cfg).unwrap();
        assert!(text.contains("token = \"abc\""));
    }
}

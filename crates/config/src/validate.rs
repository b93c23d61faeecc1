//! Semantic checks on a loaded [`BridgeConfig`].

use std::{collections::HashSet, fmt};

use crate::schema::{BridgeConfig, WsProtocol};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. `bots[0].port`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Check `config` for mistakes that would only show up at runtime.
/// `known_plugins` are the plugin names the binary links.
pub fn validate(config: &BridgeConfig, known_plugins: &[&str]) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.bots.is_empty() {
        result.push(Severity::Error, "bots", "no bridge endpoints configured");
    }

    let mut urls = HashSet::new();
    for (i, bot) in config.bots.iter().enumerate() {
        let path = format!("bots[{i}]");
        if bot.host.trim().is_empty() {
            result.push(Severity::Error, format!("{path}.host"), "host is empty");
        }
        if bot.port == 0 {
            result.push(Severity::Error, format!("{path}.port"), "port must be non-zero");
        }
        if !urls.insert(bot.endpoint_url()) {
            result.push(
                Severity::Warning,
                path.clone(),
                format!("duplicate endpoint {}", bot.endpoint_url()),
            );
        }
        let local = matches!(bot.host.as_str(), "localhost" | "127.0.0.1" | "::1");
        if bot.token.is_none() && !local {
            result.push(
                Severity::Warning,
                format!("{path}.token"),
                "remote endpoint without access token",
            );
        }
        if bot.protocol == WsProtocol::Ws && !local && bot.token.is_some() {
            result.push(
                Severity::Info,
                format!("{path}.protocol"),
                "access token is sent over plain ws",
            );
        }
    }

    if config.owners.is_empty() {
        result.push(
            Severity::Warning,
            "owners",
            "no owner configured; startup failures will only be logged",
        );
    }
    if config.prefix.trim().is_empty() {
        result.push(Severity::Warning, "prefix", "empty command prefix");
    }
    if let Some(tz) = &config.timezone
        && tz.parse::<chrono_tz::Tz>().is_err()
    {
        result.push(Severity::Error, "timezone", format!("unknown timezone '{tz}'"));
    }
    for admin in &config.admins {
        if config.owners.contains(admin) {
            result.push(
                Severity::Info,
                "admins",
                format!("{admin} is also an owner"),
            );
        }
    }

    let mut seen = HashSet::new();
    for name in &config.plugins {
        if !seen.insert(name.as_str()) {
            result.push(Severity::Warning, "plugins", format!("plugin '{name}' listed twice"));
        } else if !known_plugins.contains(&name.as_str()) {
            result.push(Severity::Error, "plugins", format!("unknown plugin '{name}'"));
        }
    }

    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::schema::BotConfig, rstest::rstest};

    #[test]
    fn default_config_only_warns_about_owners() {
        let result = validate(&BridgeConfig::default(), &[]);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
        assert_eq!(result.diagnostics[0].path, "owners");
    }

    #[test]
    fn reports_bad_endpoints_and_plugins() {
        let cfg = BridgeConfig {
            owners: vec![1],
            plugins: vec!["hi".into(), "ghost".into(), "hi".into()],
            bots: vec![
                BotConfig {
                    port: 0,
                    ..BotConfig::default()
                },
                BotConfig {
                    host: "10.0.0.9".into(),
                    ..BotConfig::default()
                },
            ],
            ..BridgeConfig::default()
        };
        let result = validate(&cfg, &["hi"]);
        let paths: Vec<&str> = result.diagnostics.iter().map(|d| d.path.as_str()).collect();
        assert!(paths.contains(&"bots[0].port"));
        assert!(paths.contains(&"bots[1].token"));
        assert!(result.diagnostics.iter().any(|d| d.message == "unknown plugin 'ghost'"));
        assert!(result.diagnostics.iter().any(|d| d.message == "plugin 'hi' listed twice"));
        assert!(result.has_errors());
    }

    #[rstest]
    #[case("Asia/Shanghai", false)]
    #[case("UTC", false)]
    #[case("Mars/Olympus_Mons", true)]
    fn checks_timezone(#[case] tz: &str, #[case] is_error: bool) {
        let cfg = BridgeConfig {
            owners: vec![1],
            timezone: Some(tz.into()),
            ..BridgeConfig::default()
        };
        assert_eq!(validate(&cfg, &[]).has_errors(), is_error);
    }

    #[test]
    fn no_bots_is_an_error() {
        let cfg = BridgeConfig {
            owners: vec![1],
            bots: Vec::new(),
            ..BridgeConfig::default()
        };
        let result = validate(&cfg, &[]);
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].to_string(), "error: bots: no bridge endpoints configured");
    }
}

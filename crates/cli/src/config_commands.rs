use {
    anyhow::Result,
    onebridge_config::{BridgeConfig, Severity, validate},
    onebridge_plugins::{PluginLoader, bundled},
    secrecy::Secret,
    std::path::Path,
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(config: &BridgeConfig, path: Option<&Path>, verbose: bool) -> Result<()> {
    match path {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let known = bundled::loader().available();
    let known: Vec<&str> = known.iter().map(String::as_str).collect();
    let result = validate(config, &known);

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    println!("{}", toml::to_string_pretty(&redacted(config))?);

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// `config` with access tokens masked, for printing.
fn redacted(config: &BridgeConfig) -> BridgeConfig {
    let mut config = config.clone();
    for bot in &mut config.bots {
        if bot.token.is_some() {
            bot.token = Some(Secret::new("********".into()));
        }
    }
    config
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, onebridge_config::load_config};

    #[test]
    fn printed_config_hides_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onebridge.toml");
        std::fs::write(&path, "[[bots]]\nhost = \"10.0.0.5\"\ntoken = \"hunter2\"\n").unwrap();
        let config = load_config(&path).unwrap();

        let printed = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("token = \"********\""));
        assert!(printed.contains("host = \"10.0.0.5\""));
    }
}

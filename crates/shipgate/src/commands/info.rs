//! Info command: show package and effective configuration.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipgate_core::config::{self, Config};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_config_dir: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    api_url: String,
    repositories: Vec<String>,
    token_configured: bool,
    resolve_names: bool,
    releasable_branch_regex: String,
    skip_compare_publications: bool,
    contributors_file: String,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &camino::Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            user_config_dir: config::user_config_dir().map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            api_url: config.github.api_url.clone(),
            repositories: config
                .github
                .repositories
                .iter()
                .map(ToString::to_string)
                .collect(),
            token_configured: config.github.read_only_auth_token.is_some(),
            resolve_names: config.github.resolve_names,
            releasable_branch_regex: config.release.releasable_branch_regex.clone(),
            skip_compare_publications: config.release.skip_compare_publications,
            contributors_file: config.contributors.output_file.to_string(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
}

/// Print package information and the effective configuration.
///
/// The token itself is never printed, only whether one is configured.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let package = &info.package;
    println!("{} {}", package.name.bold(), package.version.green());
    if !package.description.is_empty() {
        println!("{}", package.description);
    }
    if !package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), package.license);
    }
    if !package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), package.repository.cyan());
    }

    let cfg = &info.config;
    println!();
    println!("{}", "Configuration".bold().underline());
    match cfg.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), cfg.log_level);
    if let Some(ref dir) = cfg.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }

    println!();
    println!("{}", "GitHub".bold().underline());
    println!("{}: {}", "API".dimmed(), cfg.api_url.cyan());
    if cfg.repositories.is_empty() {
        println!("{}: {}", "Repositories".dimmed(), "origin only".dimmed());
    } else {
        println!("{}: origin, {}", "Repositories".dimmed(), cfg.repositories.join(", "));
    }
    let token = if cfg.token_configured {
        "configured".green().to_string()
    } else {
        "from environment or none".yellow().to_string()
    };
    println!("{}: {token}", "Token".dimmed());
    println!(
        "{}: {}",
        "Resolve names".dimmed(),
        if cfg.resolve_names { "yes" } else { "no" }
    );

    println!();
    println!("{}", "Release".bold().underline());
    println!(
        "{}: {}",
        "Releasable branches".dimmed(),
        cfg.releasable_branch_regex.cyan()
    );
    println!(
        "{}: {}",
        "Compare publications".dimmed(),
        if cfg.skip_compare_publications { "no" } else { "yes" }
    );
    println!("{}: {}", "Contributors file".dimmed(), cfg.contributors_file);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cwd() -> camino::Utf8PathBuf {
        camino::Utf8PathBuf::from("/tmp")
    }

    #[test]
    fn test_cmd_info_text_succeeds() {
        assert!(cmd_info(InfoArgs::default(), false, &Config::default(), &test_cwd()).is_ok());
    }

    #[test]
    fn test_cmd_info_json_via_global() {
        assert!(cmd_info(InfoArgs::default(), true, &Config::default(), &test_cwd()).is_ok());
    }

    #[test]
    fn test_config_info_no_file() {
        let cwd = camino::Utf8PathBuf::from("/nonexistent");
        let info = ConfigInfo::from_config(&Config::default(), &cwd);
        assert!(info.config_file.is_none());
        assert_eq!(info.log_level, "info");
        assert_eq!(info.releasable_branch_regex, "master|release/.+");
        assert!(!info.token_configured);
    }

    #[test]
    fn test_config_info_never_carries_token() {
        let mut config = Config::default();
        config.github.read_only_auth_token = Some("ghp_secret".into());
        let info = ConfigInfo::from_config(&config, &test_cwd());
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("ghp_secret"));
        assert!(info.token_configured);
    }
}

//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};
use serde_json::Value;

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, AtelierConfig, CONFIG_NAMES};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Get { key } => get_config(&key, ctx),
        ConfigCommand::Init { force } => init_config(force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let c = &ctx.config;
    ctx.output.info("");
    ctx.output.info("[storefront]");
    ctx.output.kv("currency", &c.storefront.currency);
    ctx.output.kv("tax_rate", &c.storefront.tax_rate.to_string());
    ctx.output.kv(
        "free_shipping_threshold",
        &format!("{:.2}", c.storefront.free_shipping_threshold),
    );
    ctx.output
        .kv("standard_shipping", &format!("{:.2}", c.storefront.standard_shipping));
    ctx.output.kv("max_quantity", &c.storefront.max_quantity.to_string());
    ctx.output
        .kv("low_stock_threshold", &c.storefront.low_stock_threshold.to_string());

    ctx.output.info("");
    ctx.output.info("[storage]");
    ctx.output.kv("data_dir", &ctx.data_dir().display().to_string());

    ctx.output.info("");
    ctx.output.info("[remote]");
    ctx.output.kv("kind", lookup(c, "remote.kind")?.as_str().unwrap_or_default());
    if let Some(url) = &c.remote.url {
        ctx.output.kv("url", url);
    }
    ctx.output.kv("api_key_env", &c.remote.api_key_env);
    ctx.output.kv("timeout_secs", &c.remote.timeout_secs.to_string());

    ctx.output.info("");
    ctx.output.info("[sync]");
    ctx.output.kv("max_retries", &c.sync.max_retries.to_string());
    ctx.output.kv("backoff_ms", &c.sync.backoff_ms.to_string());

    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("level", &c.logging.level);
    ctx.output.kv("format", lookup(c, "logging.format")?.as_str().unwrap_or_default());
    Ok(())
}

fn get_config(key: &str, ctx: &Context) -> Result<()> {
    let value = lookup(&ctx.config, key)?;
    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "key": key, "value": value }));
    } else {
        match value {
            Value::String(s) => println!("{s}"),
            other => println!("{other}"),
        }
    }
    Ok(())
}

fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())?;
    ctx.output.success(&format!("Created: {}", config_path.display()));
    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = ctx.config.validate();
    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {error}"));
    }
    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {warning}"));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");
    Ok(())
}

/// Read a dot-separated key such as `storefront.tax_rate`.
fn lookup(config: &AtelierConfig, key: &str) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    for part in key.split('.') {
        value = match value {
            Value::Object(mut map) => match map.remove(part) {
                Some(v) => v,
                None => bail!("Unknown config key: {key}"),
            },
            _ => bail!("Unknown config key: {key}"),
        };
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_dotted_keys() {
        let config = AtelierConfig::default();
        assert_eq!(lookup(&config, "storefront.currency").unwrap(), "GBP");
        assert_eq!(lookup(&config, "remote.kind").unwrap(), "memory");
        assert_eq!(lookup(&config, "storefront.max_quantity").unwrap(), 10);
        assert!(lookup(&config, "storefront").unwrap().is_object());
    }

    #[test]
    fn test_lookup_unknown_key() {
        let config = AtelierConfig::default();
        assert!(lookup(&config, "storefront.nope").is_err());
        assert!(lookup(&config, "storefront.currency.code").is_err());
    }
}

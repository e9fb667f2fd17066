//! config command - Get, set, or list configuration values

use super::load_config;
use crate::core::config::{Config, CONFIG_KEYS};
use crate::engine::Context;
use anyhow::{Context as _, Result};

/// Get a configuration value.
pub fn get(_ctx: &Context, key: &str) -> Result<()> {
    let config = load_config()?;
    let value = config.get(key)?;
    println!("{}", value);
    Ok(())
}

/// Set a configuration value.
pub fn set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let mut config = load_config()?;
    Config::set(&mut config.global, key, value)
        .with_context(|| format!("Invalid value for {key}"))?;
    let path = config.save().context("Failed to write config")?;

    if !ctx.quiet {
        println!("Set {} = {} in {}", key, value, path.display());
    }
    Ok(())
}

/// List all configuration values.
pub fn list(_ctx: &Context) -> Result<()> {
    let config = load_config()?;

    match config.global_config_loaded_from() {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No config file; showing defaults"),
    }
    for key in CONFIG_KEYS {
        println!("{} = {}", key, config.get(key)?);
    }
    Ok(())
}

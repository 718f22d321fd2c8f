//! Config command
//!
//! Handles `vigil config`: prints the effective configuration as TOML.

use anyhow::{Context, Result};
use vigil_core::{get_default_config_path, Config};

use crate::app::{self, InitOptions};

pub fn run() -> Result<()> {
    let ctx = app::initialize(InitOptions::command())?;

    println!("# {}", get_default_config_path().display());
    print!("{}", render(ctx.config())?);
    Ok(())
}

fn render(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}

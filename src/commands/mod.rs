// Provisioning stages
pub mod extras;
pub mod install;
pub mod post_install;

// Inspection and setup
pub mod config;
pub mod doctor;
pub mod status;

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use crate::Context;
use crate::config::Loaded;
use crate::engine::StageOptions;

/// How to invoke archup again from a generated script
#[derive(Debug, Clone)]
pub struct Invocation {
    pub binary: PathBuf,
    /// Config passed with `--config`; `None` relies on the default lookup
    pub config: Option<PathBuf>,
}

impl Invocation {
    /// The running binary with the config it was started with
    pub fn current(config: Option<&Path>) -> Result<Self> {
        let binary = std::env::current_exe().context("Could not locate the archup binary")?;
        Ok(Self {
            binary,
            config: config.map(Path::to_path_buf),
        })
    }

    /// A shell script that runs `stage` with these settings
    pub fn script(&self, stage: &str, comment: &str) -> String {
        let mut command = format!("exec {}", shell_quote(&self.binary.to_string_lossy()));
        if let Some(config) = &self.config {
            command.push_str(&format!(" --config {}", shell_quote(&config.to_string_lossy())));
        }
        format!("#!/bin/sh\n# {comment}\n# Generated by archup\n{command} {stage} \"$@\"\n")
    }
}

/// Single-quote a string for POSIX sh
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Load and validate the config, reporting where it came from
pub fn load_config(ctx: &Context) -> Result<Loaded> {
    let loaded = crate::config::load(ctx.config.as_deref())?;
    match &loaded.source {
        Some(path) => log::info!("Loaded config from {}", path.display()),
        None => {
            if !ctx.quiet {
                crate::ui::warn("No archup.toml found, using built-in defaults");
            }
        }
    }
    Ok(loaded)
}

pub fn stage_options(ctx: &Context, dry_run: bool, yes: bool) -> StageOptions {
    StageOptions {
        dry_run,
        yes,
        quiet: ctx.quiet,
    }
}

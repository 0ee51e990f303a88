use anyhow::Result;
use std::path::PathBuf;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config;
use crate::paths;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Init { force, path } => init(path, force),
        ConfigCommand::Validate => validate(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    ui::header("Configuration");

    println!();
    ui::info("Search order");
    if let Some(explicit) = &ctx.config {
        ui::dim(&format!("  {} (--config / {})", explicit.display(), paths::ENV_CONFIG));
    }
    for candidate in paths::default_config_candidates() {
        let state = if candidate.is_file() { "found" } else { "missing" };
        ui::dim(&format!("  {} ({state})", candidate.display()));
    }

    let loaded = config::load(ctx.config.as_deref())?;
    println!();
    match &loaded.source {
        Some(path) => ui::kv("Loaded", &path.display().to_string()),
        None => ui::kv("Loaded", "built-in defaults"),
    }
    println!();
    print!("{}", config::render(&loaded.config)?);
    Ok(())
}

fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let Some(path) = path.or_else(paths::user_config) else {
        anyhow::bail!("Could not determine a config directory; pass a path");
    };

    config::init(&path, force)?;
    ui::success(&format!("Wrote default config to {}", path.display()));
    ui::dim("Edit it, then copy it next to archup on the install medium.");
    Ok(())
}

fn validate(ctx: &Context) -> Result<()> {
    let loaded = config::load(ctx.config.as_deref())?;
    let source = loaded
        .source
        .as_ref()
        .map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());
    ui::success(&format!("{source} is valid"));
    Ok(())
}

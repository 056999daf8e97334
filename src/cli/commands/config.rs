//! Config Command
//!
//! Manage Palmer configuration.
//!
//! Usage:
//!   palmer config show [-g] [-f toml|json|yaml]
//!   palmer config path
//!   palmer config init [-g] [--force]

use crate::cli::ui::output::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show configuration
pub fn show(global: bool, format: &str) -> Result<()> {
    if !global {
        // Merged effective config
        return ConfigLoader::show_config(format);
    }

    match ConfigLoader::global_config_path() {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            println!("# Global Config: {}\n", path.display());
            println!("{}", content);
        }
        Some(_) => {
            println!("No global config found.");
            println!("Run 'palmer config init --global' to create one.");
        }
        None => println!("Cannot determine global config directory."),
    }
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let out = Output::new();
    let dir = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };

    let scope = if global { "global" } else { "project" };
    out.success(&format!("Initialized {} configuration", scope));
    out.field("Directory", dir.display());
    out.field("Config", dir.join("config.toml").display());
    Ok(())
}

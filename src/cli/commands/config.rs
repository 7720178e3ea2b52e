//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, config_path: Option<PathBuf>, settings: Settings) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            if !config_path.exists() {
                println!("# defaults ({} does not exist)", config_path.display());
            }
            println!("{}", toml_str);
        }

        ConfigAction::Edit => {
            if !config_path.exists() {
                settings.save_to(&config_path)?;
                Output::info(&format!("Created default config at {}", config_path.display()));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
            let status = std::process::Command::new(&editor)
                .arg(&config_path)
                .status()
                .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", editor, e))?;

            if !status.success() {
                Output::warning("Editor exited with non-zero status.");
                return Ok(());
            }

            // Catch typos now rather than on the next pipeline run
            match Settings::load_from(Some(&config_path)) {
                Ok(_) => Output::success("Config saved."),
                Err(e) => {
                    Output::error(&format!("Config no longer parses: {}", e));
                    Output::info(&format!("Fix it with: recap config edit ({})", config_path.display()));
                }
            }
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

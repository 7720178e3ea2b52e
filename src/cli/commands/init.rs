//! Init command - first-run setup.

use super::doctor::{check_openai_api_key, tool_checks, CheckStatus};
use crate::cli::Output;
use crate::config::Settings;
use crate::store::SqliteItemStore;
use console::style;
use std::io::{self, Write};

/// Run the init command for first-time setup.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Recap Setup");
    println!();

    println!("{}", style("Step 1: Prerequisites").bold().cyan());
    let mut checks = tool_checks();
    checks.push(check_openai_api_key());
    for check in &checks {
        check.print();
    }
    println!();

    if checks.iter().any(|c| c.status == CheckStatus::Error)
        && !prompt_continue("Some requirements are missing. Continue anyway?")?
    {
        Output::info("Setup cancelled. Fix the issues above and run 'recap init' again.");
        return Ok(());
    }

    println!("{}", style("Step 2: Storage").bold().cyan());
    for (label, dir) in [("Data", settings.data_dir()), ("Work", settings.work_dir())] {
        if dir.exists() {
            Output::info(&format!("{} directory exists: {}", label, dir.display()));
        } else {
            std::fs::create_dir_all(&dir)?;
            Output::success(&format!("Created {} directory: {}", label.to_lowercase(), dir.display()));
        }
    }

    let db_path = settings.sqlite_path();
    SqliteItemStore::new(&db_path)?;
    Output::success(&format!("Item store ready: {}", db_path.display()));
    println!();

    println!("{}", style("Step 3: Configuration file").bold().cyan());
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Config file exists: {}", config_path.display()));
    } else if prompt_continue("Create default configuration file?")? {
        settings.save_to(&config_path)?;
        Output::success(&format!("Created config file: {}", config_path.display()));
        println!("  Edit it with: {}", style("recap config edit").green());
    } else {
        Output::info("Using built-in defaults.");
    }
    println!();

    println!("{}", style("Setup Complete!").bold().green());
    println!();
    println!("Next steps:");
    println!("  {} Queue a video or episode", style("recap add <url>").cyan());
    println!("  {} Fetch, transcribe and summarize everything pending", style("recap run").cyan());
    println!("  {} See where each item stands", style("recap list").cyan());

    Ok(())
}

/// Prompt user for yes/no confirmation.
fn prompt_continue(message: &str) -> io::Result<bool> {
    print!("{} {} {} ", style("?").cyan(), message, style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

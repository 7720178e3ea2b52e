//! Doctor command - verify tools, storage and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::model::{Item, ItemStatus};
use crate::store::{ItemStore, SqliteItemStore};
use console::style;
use std::process::Command;

/// Outcome of a single check.
#[derive(Debug)]
pub(super) struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub(super) enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            hint: hint.map(str::to_string),
        }
    }

    fn ok(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Ok, message, None)
    }

    fn warning(name: &str, message: impl Into<String>, hint: &str) -> Self {
        Self::new(name, CheckStatus::Warning, message, Some(hint))
    }

    fn error(name: &str, message: impl Into<String>, hint: &str) -> Self {
        Self::new(name, CheckStatus::Error, message, Some(hint))
    }

    pub(super) fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Recap Doctor");
    println!();

    let sections = [
        ("External Tools", tool_checks()),
        ("OpenAI", vec![check_openai_api_key()]),
        ("Storage", storage_checks(settings).await),
        (
            "Configuration",
            vec![check_config_file(), check_retry(settings), check_webhook(settings)],
        ),
    ];

    let mut errors = 0;
    let mut warnings = 0;
    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running the pipeline.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Recap is ready to use.");
    }

    Ok(())
}

/// yt-dlp, ffmpeg and ffprobe availability.
pub(super) fn tool_checks() -> Vec<CheckResult> {
    vec![
        check_tool("yt-dlp", "--version"),
        check_tool("ffmpeg", "-version"),
        check_tool("ffprobe", "-version"),
    ]
}

fn check_tool(name: &str, version_arg: &str) -> CheckResult {
    let hint = install_hint(name);
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("installed").trim();
            CheckResult::ok(name, crate::cli::output::content_preview(version, 50))
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, format!("error: {}", e), hint),
    }
}

pub(super) fn check_openai_api_key() -> CheckResult {
    const HINT: &str = "Set with: export OPENAI_API_KEY='sk-...'";
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", format!("configured ({})", masked))
        }
        Ok(key) if key.trim().is_empty() => CheckResult::error("OPENAI_API_KEY", "empty", HINT),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error("OPENAI_API_KEY", "not set", HINT),
    }
}

async fn storage_checks(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let work_dir = settings.work_dir();
    match std::fs::create_dir_all(&work_dir).and_then(|_| tempfile::tempfile_in(&work_dir)) {
        Ok(_) => results.push(CheckResult::ok(
            "Work directory",
            format!("{} (writable)", work_dir.display()),
        )),
        Err(e) => results.push(CheckResult::error(
            "Work directory",
            format!("{}: {}", work_dir.display(), e),
            "Set general.work_dir to a writable location",
        )),
    }

    let db_path = settings.sqlite_path();
    if !db_path.exists() {
        results.push(CheckResult::warning(
            "Database",
            format!("{} (not created yet)", db_path.display()),
            "Created by 'recap init' or the first 'recap add'",
        ));
        return results;
    }

    let items = match SqliteItemStore::new(&db_path) {
        Ok(store) => store.list_items(None, None).await,
        Err(e) => Err(e),
    };
    match items {
        Ok(items) => {
            let size = std::fs::metadata(&db_path)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "unknown size".to_string());
            results.push(CheckResult::ok(
                "Database",
                format!("{} ({}, {} items)", db_path.display(), size, items.len()),
            ));
            results.push(check_stranded(&items));
        }
        Err(e) => results.push(CheckResult::error(
            "Database",
            format!("{}: {}", db_path.display(), e),
            "Move the file aside and run 'recap init' to start fresh",
        )),
    }

    results
}

/// Items left in an in-progress state are not picked up again on their own.
fn check_stranded(items: &[Item]) -> CheckResult {
    let stranded: Vec<&Item> = items.iter().filter(|i| i.status.is_in_progress()).collect();
    let failed = items
        .iter()
        .filter(|i| i.status == ItemStatus::Failed)
        .count();

    if stranded.is_empty() {
        return CheckResult::ok("Item states", format!("no stranded items, {} failed", failed));
    }

    let mut states: Vec<&str> = stranded.iter().map(|i| i.status.as_str()).collect();
    states.sort_unstable();
    states.dedup();
    CheckResult::warning(
        "Item states",
        format!("{} item(s) in progress ({})", stranded.len(), states.join(", ")),
        "If no worker is running, these were interrupted; inspect with 'recap list --status <state>'",
    )
}

fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: recap init (or recap config edit)",
        )
    }
}

fn check_retry(settings: &Settings) -> CheckResult {
    let retry = &settings.retry;
    if retry.max_attempts == 0 {
        return CheckResult::warning(
            "Retry policy",
            "max_attempts is 0, treated as 1",
            "Set retry.max_attempts to at least 1",
        );
    }
    if retry.backoff_base_ms > retry.backoff_max_ms {
        return CheckResult::warning(
            "Retry policy",
            "backoff_base_ms exceeds backoff_max_ms",
            "Every retry will wait backoff_max_ms",
        );
    }
    CheckResult::ok(
        "Retry policy",
        format!(
            "{} attempts ({} for transcription), backoff {}ms..{}ms",
            retry.max_attempts,
            retry.transcribe_max_attempts.min(retry.max_attempts),
            retry.backoff_base_ms,
            retry.backoff_max_ms
        ),
    )
}

fn check_webhook(settings: &Settings) -> CheckResult {
    match &settings.distribution.webhook_url {
        None => CheckResult::ok("Distribution", "log only (no webhook configured)"),
        Some(raw) => match url::Url::parse(raw) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {
                CheckResult::ok("Distribution", format!("webhook {}", raw))
            }
            _ => CheckResult::error(
                "Distribution",
                format!("invalid webhook URL '{}'", raw),
                "Set distribution.webhook_url to an http(s) URL",
            ),
        },
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint.
fn install_hint(tool: &str) -> &'static str {
    match tool {
        "yt-dlp" if cfg!(target_os = "macos") => "Install with: brew install yt-dlp",
        "yt-dlp" if cfg!(target_os = "linux") => "Install with: pip install yt-dlp",
        "yt-dlp" => "Install from: https://github.com/yt-dlp/yt-dlp",
        "ffmpeg" | "ffprobe" if cfg!(target_os = "macos") => "Install with: brew install ffmpeg",
        "ffmpeg" | "ffprobe" if cfg!(target_os = "linux") => {
            "Install with: sudo apt install ffmpeg"
        }
        "ffmpeg" | "ffprobe" => "Install from: https://ffmpeg.org/download.html",
        _ => "Check the documentation for installation instructions",
    }
}

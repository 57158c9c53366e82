// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `marionette doctor` command implementation.
//!
//! Probes the configuration, the remote user database, and the homeserver
//! with both configured credentials, then prints one line per check.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use marionette_config::model::MarionetteConfig;
use marionette_core::MarionetteError;
use marionette_matrix::ApiClient;
use serde_json::Value;

/// Per-request timeout of the network probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Runs the `marionette doctor` command.
///
/// With `deep`, also runs a SQLite integrity check. With `plain`, disables
/// colored output. Returns the number of failed checks.
pub async fn run_doctor(
    config: &MarionetteConfig,
    config_path: Option<&Path>,
    deep: bool,
    plain: bool,
) -> Result<usize, MarionetteError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let homeserver = &config.homeserver;

    let mut results = vec![
        check_config(config_path),
        check_database(&config.storage.database_path).await,
        check_homeserver(&homeserver.url).await,
        check_credentials(
            "App service token",
            &homeserver.url,
            homeserver.as_token.as_deref(),
            None,
        )
        .await,
        check_credentials(
            "Puppet session",
            &homeserver.url,
            config.puppet.access_token.as_deref(),
            config.puppet.user_id.as_deref(),
        )
        .await,
    ];
    if deep {
        results.push(check_db_integrity(&config.storage.database_path).await);
    }

    println!();
    println!("  marionette doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let fail_count = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    let warn_count = results
        .iter()
        .filter(|r| r.status == CheckStatus::Warn)
        .count();
    let issues = fail_count + warn_count;
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(fail_count)
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if !use_color {
        let label = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        return format!(
            "    {label} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        );
    }

    use colored::Colorize;
    let (symbol, message) = match result.status {
        CheckStatus::Pass => ("✓".green(), result.message.normal()),
        CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
        CheckStatus::Fail => ("✗".red(), result.message.red()),
    };
    format!(
        "    {symbol} {:<20} {message} ({duration_ms}ms)",
        result.name
    )
}

/// Check configuration loads and validates.
fn check_config(path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => marionette_config::load_and_validate_path(path),
        None => marionette_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Check the database file exists and answers a query.
async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new(
                "Database",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };
    let users = conn
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row("SELECT COUNT(*) FROM remote_users", [], |row| row.get(0))
        })
        .await;
    match users {
        Ok(count) => CheckResult::new(
            "Database",
            CheckStatus::Pass,
            format!("connected ({count} cached user(s))"),
            start,
        ),
        Err(e) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("query failed: {e}"),
            start,
        ),
    }
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "DB integrity",
            CheckStatus::Warn,
            "database not found (skipped)",
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new(
                "DB integrity",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };
    let rows = conn
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await;
    match rows {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("check failed: {e}"),
            start,
        ),
    }
}

/// Check the client-server API answers the unauthenticated versions probe.
async fn check_homeserver(base_url: &str) -> CheckResult {
    let start = Instant::now();
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return CheckResult::new(
                "Homeserver",
                CheckStatus::Fail,
                format!("HTTP client error: {e}"),
                start,
            );
        }
    };

    let url = format!("{}/_matrix/client/versions", base_url.trim_end_matches('/'));
    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let latest = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("versions")?
                        .as_array()?
                        .last()?
                        .as_str()
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "unknown version".to_string());
            CheckResult::new(
                "Homeserver",
                CheckStatus::Pass,
                format!("reachable ({latest})"),
                start,
            )
        }
        Ok(resp) => CheckResult::new(
            "Homeserver",
            CheckStatus::Warn,
            format!("status {}", resp.status()),
            start,
        ),
        Err(e) => {
            let message = if e.is_timeout() {
                format!("timeout ({}s)", PROBE_TIMEOUT.as_secs())
            } else if e.is_connect() {
                format!("connection refused at {base_url}")
            } else {
                format!("error: {e}")
            };
            CheckResult::new("Homeserver", CheckStatus::Fail, message, start)
        }
    }
}

/// Check a token is accepted by `whoami`, optionally as the expected user.
async fn check_credentials(
    name: &str,
    base_url: &str,
    token: Option<&str>,
    expected_user: Option<&str>,
) -> CheckResult {
    let start = Instant::now();
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return CheckResult::new(name, CheckStatus::Warn, "no token configured", start);
    };

    let api = match ApiClient::new(base_url, token, PROBE_TIMEOUT) {
        Ok(api) => api,
        Err(e) => return CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    };
    let request = api.http().get(api.client_url(&["account", "whoami"]));
    match api.send::<Value>(request).await {
        Ok(body) => {
            let user_id = body.get("user_id").and_then(Value::as_str).unwrap_or("?");
            match expected_user {
                Some(expected) if expected != user_id => CheckResult::new(
                    name,
                    CheckStatus::Fail,
                    format!("token belongs to {user_id}, expected {expected}"),
                    start,
                ),
                _ => CheckResult::new(
                    name,
                    CheckStatus::Pass,
                    format!("authenticated as {user_id}"),
                    start,
                ),
            }
        }
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::config::EnvSource;
use crate::model::report::WorkReport;
use crate::providers::jira::JiraConnector;
use crate::server::{self, AppState};

const ACTIVATE_ATTEMPTS: usize = 3;
const ACTIVATE_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Serve,
    Activate(String),
    Warm(String),
    Help,
}

pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        return Ok(Command::Serve);
    };

    let url = || -> Result<String> {
        match args.get(1) {
            Some(url) if !url.trim().is_empty() => Ok(url.clone()),
            _ => bail!("Usage: ncfu {first} <base-url>"),
        }
    };

    match first.as_str() {
        "serve" => Ok(Command::Serve),
        "activate" => Ok(Command::Activate(url()?)),
        "warm" => Ok(Command::Warm(url()?)),
        "-h" | "--help" | "help" => Ok(Command::Help),
        other => bail!("Unknown command '{other}'. Run `ncfu --help` for usage."),
    }
}

pub async fn dispatch(args: &[String]) -> Result<()> {
    match parse_args(args)? {
        Command::Serve => {
            let state = AppState {
                config_source: Arc::new(EnvSource),
                connector: Arc::new(JiraConnector),
            };
            server::serve(state).await
        }
        Command::Activate(base_url) => handle_activate(&base_url).await,
        Command::Warm(base_url) => handle_warm(&base_url).await,
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

fn endpoint(base_url: &str, resource: &str) -> String {
    format!("{}/{resource}", base_url.trim_end_matches('/'))
}

async fn handle_activate(base_url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    match activate(&client, base_url, ACTIVATE_ATTEMPTS, ACTIVATE_WAIT).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(errors) => {
            println!("Something went wrong while moving your issues:");
            for (attempt, err) in errors.iter().enumerate() {
                println!("  (attempt {}) {err}", attempt + 1);
            }
            bail!("/work failed after {} attempts", errors.len())
        }
    }
}

/// Calls `/work` up to `attempts` times, sleeping `wait` between failed tries.
///
/// Returns the first successful report, or one message per failed attempt.
pub async fn activate(
    client: &reqwest::Client,
    base_url: &str,
    attempts: usize,
    wait: Duration,
) -> std::result::Result<WorkReport, Vec<String>> {
    let url = endpoint(base_url, "work");
    let mut errors = Vec::new();

    for attempt in 1..=attempts {
        match fetch_report(client, &url).await {
            Ok(report) => return Ok(report),
            Err(e) => {
                tracing::warn!(attempt, "GET {url} failed: {e:#}");
                errors.push(format!("{e:#}"));
                if attempt < attempts {
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    Err(errors)
}

async fn fetch_report(client: &reqwest::Client, url: &str) -> Result<WorkReport> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{url} returned HTTP {}: {body}", status.as_u16());
    }

    resp.json().await.context("unreadable /work response")
}

fn print_report(report: &WorkReport) {
    if report.forgot == 0 {
        println!("Nothing left behind.");
        return;
    }
    println!("You forgot to move some issues, they are back in the todo column:");
    for item in report.moved() {
        println!("  ({}) - {}", item.id, item.title);
    }
}

async fn handle_warm(base_url: &str) -> Result<()> {
    let url = endpoint(base_url, "ping");
    let body = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()?
        .text()
        .await?;
    println!("{body}");
    Ok(())
}

pub fn print_help() {
    println!("ncfu: moves forgotten in-progress Jira issues back to todo\n");
    println!("USAGE:");
    println!("  ncfu                     Serve GET /work and GET /ping on {}", server::BIND_ADDR);
    println!("  ncfu serve               Same as above");
    println!("  ncfu activate <base-url> Trigger /work (3 attempts, 30s apart) and print the report");
    println!("  ncfu warm <base-url>     Ping the service to keep it awake");
    println!();
    println!("ENVIRONMENT (serve):");
    println!("  JIRA_SERVER_URL, JIRA_USERNAME, JIRA_PASSWORD,");
    println!("  JIRA_IN_PROGRESS_COLUMN, JIRA_TODO_COLUMN, JIRA_PROJECT_ID");
}

//! talad-cli — admin frontend for the Talad HTTP API
//!
//! The companion admin panel submits session data over REST; this CLI speaks
//! the same endpoints for scripted and terminal use.
//!
//! # Subcommands
//! - `status`                                    — show server health
//! - `list [-n <limit>] [--json]`                — recent articles from the index
//! - `show <date> [--json]`                      — one day's parsed record
//! - `publish <date> --slot <slot> --index <i> --change <c> [...]` — submit a session

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8970";
const DEFAULT_LIMIT: usize = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "talad-cli",
    version,
    about = "Talad SET session commentary — admin CLI"
)]
struct Cli {
    /// Talad HTTP server URL (overrides TALAD_HTTP_URL env var)
    #[arg(long, env = "TALAD_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show Talad server status
    Status,

    /// List recent articles from the index
    List {
        /// Maximum number of articles to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Output the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show one day's session record
    Show {
        /// Article date (YYYY-MM-DD)
        date: String,

        /// Output the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Submit a session slot update
    Publish {
        /// Article date (YYYY-MM-DD)
        date: String,

        /// Session slot: morning_open, morning_close, afternoon_open, afternoon_close
        #[arg(long)]
        slot: String,

        /// Index level (e.g. 1302.75)
        #[arg(long)]
        index: f64,

        /// Signed change from the prior reference (e.g. -7.69)
        #[arg(long, allow_hyphen_values = true)]
        change: f64,

        /// Compact sector highlights (open slots)
        #[arg(long)]
        highlights: Option<String>,

        /// Pre-written narrative; omit to let the server draft one
        #[arg(long)]
        narrative: Option<String>,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ArticleListResponse {
    articles: Vec<ArticleRow>,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct ArticleRow {
    article_date: String,
    title: String,
    slots_filled: i16,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct SlotView {
    index: Option<f64>,
    change: Option<f64>,
    highlights: Option<String>,
    #[serde(default)]
    narrative: String,
}

#[derive(Debug, Deserialize)]
struct RecordView {
    date: String,
    morning_open: SlotView,
    morning_close: SlotView,
    afternoon_open: SlotView,
    afternoon_close: SlotView,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::blocking::Client::new();

    match cli.command {
        Commands::Status => status(&client, &cli.server),
        Commands::List { limit, json } => list(&client, &cli.server, limit, json),
        Commands::Show { date, json } => show(&client, &cli.server, &date, json),
        Commands::Publish {
            date,
            slot,
            index,
            change,
            highlights,
            narrative,
        } => publish(
            &client,
            &cli.server,
            &date,
            &slot,
            index,
            change,
            highlights,
            narrative,
        ),
    }
}

fn status(client: &reqwest::blocking::Client, server: &str) -> anyhow::Result<()> {
    let response = client
        .get(format!("{}/health", server))
        .send()
        .with_context(|| format!("could not reach {}", server))?;

    let status = response.status();
    let body: serde_json::Value = response.json().context("invalid health response")?;

    if status.is_success() {
        println!("server:       {}", server);
        println!("status:       {}", body["status"].as_str().unwrap_or("?"));
        println!("version:      {}", body["version"].as_str().unwrap_or("?"));
        println!("articles dir: {}", body["articles_dir"].as_str().unwrap_or("?"));
    } else {
        println!("server:  {}", server);
        println!("status:  unhealthy ({})", status);
        println!("error:   {}", body["error"].as_str().unwrap_or("?"));
    }
    Ok(())
}

fn list(
    client: &reqwest::blocking::Client,
    server: &str,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let response = client
        .get(format!("{}/articles?limit={}", server, limit))
        .send()
        .with_context(|| format!("could not reach {}", server))?;

    if !response.status().is_success() {
        bail!("listing failed: {}", response.status());
    }

    if json {
        let body: serde_json::Value = response.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let body: ArticleListResponse = response.json().context("invalid listing response")?;
    if body.articles.is_empty() {
        println!("no articles");
        return Ok(());
    }
    for article in &body.articles {
        println!(
            "{}  {}/4 sessions  {}  (updated {})",
            article.article_date, article.slots_filled, article.title, article.updated_at
        );
    }
    println!("{} article(s)", body.count);
    Ok(())
}

fn show(
    client: &reqwest::blocking::Client,
    server: &str,
    date: &str,
    json: bool,
) -> anyhow::Result<()> {
    let response = client
        .get(format!("{}/articles/{}", server, date))
        .send()
        .with_context(|| format!("could not reach {}", server))?;

    if !response.status().is_success() {
        let body: serde_json::Value = response.json().unwrap_or_default();
        bail!(
            "fetch failed: {}",
            body["error"].as_str().unwrap_or("unknown error")
        );
    }

    if json {
        let body: serde_json::Value = response.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let record: RecordView = response.json().context("invalid article response")?;
    println!("SET Market Report: {}", record.date);
    print_slot("morning open", &record.morning_open);
    print_slot("morning close", &record.morning_close);
    print_slot("afternoon open", &record.afternoon_open);
    print_slot("afternoon close", &record.afternoon_close);
    Ok(())
}

fn print_slot(label: &str, slot: &SlotView) {
    match (slot.index, slot.change) {
        (Some(index), Some(change)) => {
            println!("\n[{}]  SET {} ({:+})", label, index, change);
        }
        _ => {
            println!("\n[{}]  (no data yet)", label);
            return;
        }
    }
    if let Some(highlights) = &slot.highlights {
        println!("  highlights: {}", highlights);
    }
    if !slot.narrative.is_empty() {
        println!("  {}", slot.narrative);
    }
}

#[allow(clippy::too_many_arguments)]
fn publish(
    client: &reqwest::blocking::Client,
    server: &str,
    date: &str,
    slot: &str,
    index: f64,
    change: f64,
    highlights: Option<String>,
    narrative: Option<String>,
) -> anyhow::Result<()> {
    let mut payload = serde_json::json!({
        "slot": slot,
        "index": index,
        "change": change,
    });
    if let Some(highlights) = highlights {
        payload["highlights"] = serde_json::json!(highlights);
    }
    if let Some(narrative) = narrative {
        payload["narrative"] = serde_json::json!(narrative);
    }

    let response = client
        .post(format!("{}/articles/{}/sessions", server, date))
        .json(&payload)
        .send()
        .with_context(|| format!("could not reach {}", server))?;

    let status = response.status();
    let body: serde_json::Value = response.json().context("invalid publish response")?;

    if !status.is_success() {
        bail!(
            "publish rejected ({}): {}",
            status,
            body["error"].as_str().unwrap_or("unknown error")
        );
    }

    println!(
        "published {} {} — narrative from {} ({} of 4 sessions filled)",
        date,
        body["slot"].as_str().unwrap_or(slot),
        body["narrative_source"].as_str().unwrap_or("?"),
        body["slots_filled"].as_u64().unwrap_or(0)
    );
    Ok(())
}

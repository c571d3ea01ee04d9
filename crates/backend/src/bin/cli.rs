use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::{Client, StatusCode};
use shared_types::{classify, extract_calendar_url, CalendarSummary, Site, WebhookReply};

#[derive(Parser)]
#[command(name = "advent-cli")]
#[command(about = "CLI for inspecting and driving the advent calendar watcher")]
#[command(
    long_about = "A command-line interface for the advent calendar watcher.\n\n\
    Lists tracked calendars, starts a poll cycle on demand and registers new\n\
    calendars through the same webhook the chat platform uses."
)]
struct Cli {
    /// Watcher server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "ADVENT_API_URL"
    )]
    base_url: String,

    /// Shared secret configured on the server as WEBHOOK_TOKEN.
    #[arg(short, long, env = "WEBHOOK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracked calendars with their published entry counts
    Calendars,

    /// Start a poll cycle now
    ///
    /// The server answers immediately and runs the cycle in the background.
    /// Fails if a cycle is already running.
    Sync,

    /// Register a calendar by posting a message to the webhook
    ///
    /// The message is handled exactly like one forwarded from the chat
    /// channel, so it may contain other text around the calendar URL.
    Register {
        /// Message text containing a Qiita or Adventar calendar URL.
        text: String,

        /// Name the message is sent as.
        #[arg(short, long, default_value = "advent-cli")]
        user_name: String,
    },

    /// Show which site a URL or message belongs to, without contacting the server
    Classify {
        /// A calendar URL, or free text to scan for one.
        input: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.base_url.trim_end_matches('/');

    match cli.command {
        Commands::Calendars => list_calendars(&client, base_url).await?,
        Commands::Sync => {
            let token = cli.token.context("A token is required (--token or WEBHOOK_TOKEN)")?;
            trigger_sync(&client, base_url, &token).await?
        }
        Commands::Register { text, user_name } => {
            let token = cli.token.context("A token is required (--token or WEBHOOK_TOKEN)")?;
            register(&client, base_url, &token, &user_name, &text).await?
        }
        Commands::Classify { input } => print_classification(&input),
    }

    Ok(())
}

async fn list_calendars(client: &Client, base_url: &str) -> anyhow::Result<()> {
    let url = format!("{}/api/calendars", base_url);
    let response = client.get(&url).send().await?.error_for_status()?;
    let calendars: Vec<CalendarSummary> = response.json().await?;

    if calendars.is_empty() {
        println!("No calendars tracked.");
        return Ok(());
    }

    for calendar in &calendars {
        let title = if calendar.title.is_empty() {
            "(untitled)"
        } else {
            calendar.title.as_str()
        };
        println!(
            "[{:>8}] {:>2}/25 {}",
            calendar.site.to_string(),
            calendar.published,
            title
        );
        println!("    {}", calendar.url);
    }

    if let Some(last_updated) = calendars.first().and_then(|c| c.last_updated) {
        println!("Last updated: {}", last_updated.to_rfc3339());
    }

    Ok(())
}

async fn trigger_sync(client: &Client, base_url: &str, token: &str) -> anyhow::Result<()> {
    let url = format!("{}/api/sync/trigger", base_url);
    let response = client.post(&url).bearer_auth(token).send().await?;

    match response.status() {
        StatusCode::ACCEPTED => println!("Poll cycle started."),
        StatusCode::CONFLICT => println!("A poll cycle is already running."),
        StatusCode::UNAUTHORIZED => anyhow::bail!("Server rejected the token"),
        status => anyhow::bail!("Unexpected response: {}", status),
    }

    Ok(())
}

async fn register(
    client: &Client,
    base_url: &str,
    token: &str,
    user_name: &str,
    text: &str,
) -> anyhow::Result<()> {
    if extract_calendar_url(text).is_none() {
        anyhow::bail!("No Qiita or Adventar calendar URL found in {:?}", text);
    }

    let url = format!("{}/webhook", base_url);
    let response = client
        .post(&url)
        .form(&[("token", token), ("user_name", user_name), ("text", text)])
        .send()
        .await?
        .error_for_status()?;

    // Only a successful registration carries a body
    let body = response.bytes().await?;
    if body.is_empty() {
        anyhow::bail!("Calendar was not registered, check the server logs");
    }

    let reply: WebhookReply =
        serde_json::from_slice(&body).context("Unexpected webhook reply")?;
    println!("Registered: {}", reply.text);

    Ok(())
}

fn print_classification(input: &str) {
    match classify(input) {
        Site::Unknown => match extract_calendar_url(input) {
            Some(found) => println!("{} (found {})", found.site, found.url),
            None => println!("{}", Site::Unknown),
        },
        site => println!("{}", site),
    }
}

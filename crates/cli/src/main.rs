//! ContactSync CLI - Command-line interface for the ContactSync daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "contactsync")]
#[command(about = "Sync LinkedIn connections into a Notion database", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "CONTACTSYNC_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Notion database ID
    #[arg(long, env = "NOTION_DATABASE_ID")]
    database_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a LinkedIn Connections.csv export
    Sync {
        /// Path to the export file
        #[arg(short, long)]
        file: PathBuf,

        /// Return after queueing instead of following progress
        #[arg(long)]
        no_follow: bool,
    },

    /// Show the progress of a sync job
    Status {
        /// Job ID
        job_id: String,
    },

    /// Recompute the Overdue flag of every contact
    Overdue,

    /// Add any CRM property the Notion database is missing
    Init,

    /// List the contacts stored in Notion
    List,

    /// Update fields of one contact
    Update {
        /// Notion page ID of the contact (see `list`)
        record_id: String,

        /// JSON object of property names to values,
        /// e.g. '{"Company": "Globex", "Last Contacted": "2024-05-01"}'
        changes: String,
    },

    /// Show daemon status
    Stats,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    data: Option<serde_json::Value>,
}

#[derive(Deserialize, Tabled)]
struct SubmitResult {
    job_id: String,
    state: String,
    queue_depth: usize,
    queue_capacity: usize,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Tabled)]
struct Counts {
    added: usize,
    updated: usize,
    skipped: usize,
    failed: usize,
}

#[derive(Debug, Deserialize, Tabled)]
struct ItemError {
    index: usize,
    record: String,
    kind: String,
    detail: String,
    attempts: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorInfo {
    kind: String,
    detail: String,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    job_id: String,
    state: String,
    current: usize,
    total: usize,
    message: String,
    counts: Counts,
    #[serde(default)]
    item_errors: Vec<ItemError>,
    error: Option<ErrorInfo>,
}

impl Snapshot {
    fn is_terminal(&self) -> bool {
        matches!(self.state.as_str(), "COMPLETED" | "ERROR" | "ABANDONED")
    }
}

#[derive(Deserialize, Tabled)]
struct ContactRow {
    #[serde(rename = "id")]
    #[tabled(rename = "id")]
    record_id: String,
    name: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    position: String,
    #[serde(default, deserialize_with = "text_or_blank")]
    #[tabled(rename = "last contacted")]
    last_contacted: String,
    #[serde(default, deserialize_with = "text_or_blank")]
    cadence: String,
    overdue: bool,
}

#[derive(Deserialize)]
struct ContactList {
    total: usize,
    contacts: Vec<ContactRow>,
}

fn text_or_blank<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Wire name of a contact field, accepting Notion property names
/// ("Last Contacted", "Contact Schedule") as well as field names
fn field_name(key: &str) -> Option<&'static str> {
    let squashed: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let field = match squashed.as_str() {
        "name" => "Name",
        "email" => "Email",
        "phone" => "Phone",
        "company" => "Company",
        "position" => "Position",
        "industry" => "Industry",
        "fieldofwork" => "FieldOfWork",
        "connectedon" => "ConnectedOn",
        "lastcontacted" => "LastContacted",
        "cadence" | "contactschedule" => "Cadence",
        "overdue" => "Overdue",
        _ => return None,
    };
    Some(field)
}

/// `{"Company": "Globex"}` -> `[{"field": "Company", "value": "Globex"}]`
fn parse_changes(raw: &str) -> Result<serde_json::Value> {
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).context("Changes must be a JSON object")?;
    if object.is_empty() {
        anyhow::bail!("No fields to update");
    }
    let changes = object
        .into_iter()
        .map(|(key, value)| {
            let field = field_name(&key).with_context(|| format!("Unknown field: {}", key))?;
            Ok(json!({ "field": field, "value": value }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::Value::Array(changes))
}

#[derive(Deserialize, Tabled)]
struct OverdueSummary {
    updated: usize,
    unchanged: usize,
    skipped: usize,
    failed: usize,
}

struct RpcClient {
    url: String,
    http: reqwest::Client,
}

impl RpcClient {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to daemon")?
            .json()
            .await
            .context("Failed to parse response")?;

        if let Some(error) = response.error {
            let kind = error
                .data
                .as_ref()
                .and_then(|d| d.get("kind"))
                .and_then(|k| k.as_str())
                .unwrap_or("UNKNOWN");
            anyhow::bail!("{} ({}, code {})", error.message, kind, error.code);
        }

        let result = response
            .result
            .ok_or_else(|| anyhow::anyhow!("No result in response"))?;
        serde_json::from_value(result).context("Unexpected response shape")
    }

    async fn close_session(&self, session_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call("session.close.v1", json!({ "session_id": session_id }))
            .await?;
        Ok(())
    }
}

fn credentials(cli: &Cli) -> Result<serde_json::Value> {
    let token = cli
        .token
        .as_deref()
        .context("Notion token missing (--token or NOTION_TOKEN)")?;
    let database_id = cli
        .database_id
        .as_deref()
        .context("Notion database ID missing (--database-id or NOTION_DATABASE_ID)")?;
    Ok(json!({ "token": token, "database_id": database_id }))
}

fn print_snapshot(snapshot: &Snapshot) {
    let state = match snapshot.state.as_str() {
        "COMPLETED" => snapshot.state.green().bold(),
        "ERROR" => snapshot.state.red().bold(),
        "ABANDONED" => snapshot.state.yellow().bold(),
        _ => snapshot.state.cyan().bold(),
    };
    println!("  {} {}", "Job:".bold(), snapshot.job_id);
    println!("  {} {}", "State:".bold(), state);
    println!(
        "  {} {}/{}",
        "Progress:".bold(),
        snapshot.current,
        snapshot.total
    );
    println!("  {} {}", "Message:".bold(), snapshot.message);
    if let Some(error) = &snapshot.error {
        println!("  {} {} ({})", "Error:".bold(), error.detail.red(), error.kind);
    }
    println!();
    println!("{}", Table::new(vec![snapshot.counts]));

    if !snapshot.item_errors.is_empty() {
        println!();
        println!("{}", "Failed contacts".red().bold());
        println!("{}", Table::new(&snapshot.item_errors));
    }
}

/// Poll until the job is terminal, echoing each new message
async fn follow(client: &RpcClient, job_id: &str) -> Result<Snapshot> {
    let mut last_message = String::new();
    loop {
        let snapshot: Snapshot = client
            .call("sync.status.v1", json!({ "job_id": job_id }))
            .await?;
        if snapshot.message != last_message {
            println!("  {} {}", "•".cyan(), snapshot.message);
            last_message = snapshot.message.clone();
        }
        if snapshot.is_terminal() {
            return Ok(snapshot);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn run_sync(cli: &Cli, client: &RpcClient, file: &Path, no_follow: bool) -> Result<()> {
    let credentials = credentials(cli)?;
    // The daemon resolves paths against its own working directory
    let file = std::fs::canonicalize(file)
        .with_context(|| format!("Cannot open {}", file.display()))?;

    let opened: serde_json::Value = client.call("session.open.v1", json!({})).await?;
    let session_id = opened["session_id"]
        .as_str()
        .context("Daemon returned no session ID")?
        .to_string();

    let mut params = credentials;
    params["session_id"] = json!(session_id);
    params["file_path"] = json!(file.to_string_lossy());

    let submitted: SubmitResult = match client.call("sync.submit.v1", params).await {
        Ok(result) => result,
        Err(e) => {
            client.close_session(&session_id).await.ok();
            return Err(e);
        }
    };

    println!("{}", "✓ Sync queued".green().bold());
    println!();
    let job_id = submitted.job_id.clone();
    println!("{}", Table::new(vec![submitted]));

    if no_follow {
        // Closing the session would cancel the job, so it stays open; the
        // daemon expires it unless something polls the job
        println!();
        println!("  {} {}", "Session:".bold(), session_id);
        println!("  Check progress with: contactsync status {}", job_id);
        println!("  The job is cancelled if its status goes unpolled for too long");
        return Ok(());
    }

    println!();
    let outcome = tokio::select! {
        result = follow(client, &job_id) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    client.close_session(&session_id).await.ok();

    match outcome {
        Some(result) => {
            let snapshot = result?;
            println!();
            print_snapshot(&snapshot);
            if snapshot.state == "ERROR" {
                anyhow::bail!("Sync failed");
            }
            Ok(())
        }
        None => {
            println!();
            println!("{}", "✗ Cancelled, session closed".yellow().bold());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RpcClient::new(&cli.rpc_url);

    match &cli.command {
        Commands::Sync { file, no_follow } => {
            run_sync(&cli, &client, file, *no_follow).await?;
        }

        Commands::Status { job_id } => {
            let snapshot: Snapshot = client
                .call("sync.status.v1", json!({ "job_id": job_id }))
                .await?;
            print_snapshot(&snapshot);
        }

        Commands::Overdue => {
            println!("{}", "Evaluating overdue contacts...".cyan().bold());
            let summary: OverdueSummary = client
                .call("overdue.evaluate.v1", credentials(&cli)?)
                .await?;
            println!();
            println!("{}", Table::new(vec![summary]));
        }

        Commands::Init => {
            let schema: serde_json::Value = client
                .call("store.schema.ensure.v1", credentials(&cli)?)
                .await?;
            let added: Vec<String> = serde_json::from_value(schema["added"].clone())
                .context("Unexpected response shape")?;
            if added.is_empty() {
                println!("{}", "✓ Database already has every contact property".green().bold());
            } else {
                println!("{}", "✓ Added contact properties".green().bold());
                for name in added {
                    println!("  {} {}", "•".cyan(), name);
                }
            }
        }

        Commands::List => {
            let list: ContactList = client
                .call("contacts.list.v1", credentials(&cli)?)
                .await?;
            println!("{} {}", "Contacts:".cyan().bold(), list.total);
            if !list.contacts.is_empty() {
                println!();
                println!("{}", Table::new(&list.contacts));
            }
        }

        Commands::Update { record_id, changes } => {
            let mut params = credentials(&cli)?;
            params["record_id"] = json!(record_id);
            params["changes"] = parse_changes(changes)?;
            let updated: serde_json::Value = client.call("contacts.update.v1", params).await?;
            println!(
                "{} {} ({} fields)",
                "✓ Updated".green().bold(),
                record_id,
                updated["updated"]
            );
        }

        Commands::Stats => {
            println!("{}", "Daemon Status".cyan().bold());
            println!();

            match client
                .call::<serde_json::Value>("admin.stats.v1", json!({}))
                .await
            {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!(
                        "  {} {}/{}",
                        "Queue:".bold(),
                        stats["queue_depth"],
                        stats["queue_capacity"]
                    );
                    println!("  {} {}", "Sessions:".bold(), stats["active_sessions"]);
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}

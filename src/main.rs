//! CLI entry point for fmdata — a command-line front end to the Data API.
//!
//! Connection settings come from flags, environment variables, or a JSON
//! config file (`--config`). Results are printed as JSON on stdout.
//!
//! Exit codes:
//! - 0: success
//! - 1: runtime error (auth failure, server error, network, etc.)
//! - 2: argument validation error (clap handles this automatically)

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use fmdata::client::FmClient;
use fmdata::config::{ApiVersion, ConnectionInfo};
use fmdata::request::{
    CreateRequest, DeleteRequest, FindRequest, GetRecordRequest, PortalSpec, Script,
};
use fmdata::script::RunScriptRequest;
use fmdata::{FmError, Record};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON file with server, database, username, password, and version.
    /// Flags override values from the file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server base URL, e.g. https://fms.example.com.
    #[arg(long, env = "FMDATA_SERVER")]
    server: Option<String>,

    /// Hosted database name.
    #[arg(long, env = "FMDATA_DATABASE")]
    database: Option<String>,

    #[arg(long, env = "FMDATA_USER")]
    username: Option<String>,

    /// Prefer the FMDATA_PASSWORD environment variable to keep the
    /// password out of process listings and shell history.
    #[arg(long, env = "FMDATA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// API version segment: v1, v2, or latest.
    #[arg(long = "api-version")]
    api_version: Option<ApiVersion>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find records. Without --query, lists the layout's records.
    Find {
        #[arg(long)]
        layout: String,
        /// Criteria as FIELD=VALUE. Repeat to AND several fields.
        #[arg(long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Exclude records matching the criteria instead of including them.
        #[arg(long)]
        omit: bool,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
        /// Portal names to include.
        #[arg(long)]
        portal: Vec<String>,
    },
    /// Fetch one record by id.
    Get {
        #[arg(long)]
        layout: String,
        #[arg(long)]
        id: i64,
    },
    /// Create a record from FIELD=VALUE pairs.
    Create {
        #[arg(long)]
        layout: String,
        #[arg(long = "field", value_parser = parse_pair)]
        fields: Vec<(String, String)>,
        /// Script to run after the record is created.
        #[arg(long)]
        script: Option<String>,
    },
    /// Delete a record by id.
    Delete {
        #[arg(long)]
        layout: String,
        #[arg(long)]
        id: i64,
    },
    /// Run a script in the context of a layout.
    Script {
        #[arg(long)]
        layout: String,
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        param: Option<String>,
    },
    /// List layouts in the database.
    Layouts,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected FIELD=VALUE, got '{raw}'")),
    }
}

fn pairs_to_object(pairs: &[(String, String)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Merges the config file (if any) with flag/env values.
fn connection_info(cli: &Cli) -> Result<ConnectionInfo, FmError> {
    let mut info = match &cli.config {
        Some(path) => ConnectionInfo::from_file(path)?,
        None => ConnectionInfo::new("", "", "", ""),
    };
    if let Some(server) = &cli.server {
        info.server = server.clone();
    }
    if let Some(database) = &cli.database {
        info.database = database.clone();
    }
    if let Some(username) = &cli.username {
        info.username = username.clone();
    }
    if let Some(password) = &cli.password {
        info.password = password.clone();
    }
    if let Some(version) = cli.api_version {
        info.version = version;
    }
    info.validate()?;
    Ok(info)
}

fn record_json(record: Record<Value>) -> Value {
    json!({
        "recordId": record.record_id,
        "modId": record.mod_id,
        "fieldData": record.value,
    })
}

async fn run(client: &FmClient, command: Command) -> Result<Value, FmError> {
    match command {
        Command::Find {
            layout,
            query,
            omit,
            limit,
            offset,
            portal,
        } => {
            let mut request = FindRequest::new(&layout);
            if !query.is_empty() {
                let criteria = pairs_to_object(&query);
                request = if omit {
                    request.omit(criteria)
                } else {
                    request.query(criteria)
                };
            }
            if let Some(limit) = limit {
                request = request.limit(limit);
            }
            if let Some(offset) = offset {
                request = request.offset(offset);
            }
            for name in &portal {
                request = request.portal(PortalSpec::new(name));
            }
            let records = client.find::<Value, _>(&request).await?;
            Ok(Value::Array(records.into_iter().map(record_json).collect()))
        }
        Command::Get { layout, id } => {
            let record = client
                .get_by_id::<Value>(&GetRecordRequest::new(&layout, id))
                .await?;
            Ok(record.map(record_json).unwrap_or(Value::Null))
        }
        Command::Create {
            layout,
            fields,
            script,
        } => {
            let mut request = CreateRequest::new(&layout, pairs_to_object(&fields));
            if let Some(name) = script {
                request = request.script(Script::new(&name));
            }
            let created = client.create(&request).await?;
            Ok(json!({"recordId": created.record_id, "modId": created.mod_id}))
        }
        Command::Delete { layout, id } => {
            client.delete(&DeleteRequest::new(&layout, id)).await?;
            Ok(json!({"deleted": id}))
        }
        Command::Script {
            layout,
            name,
            param,
        } => {
            let mut request = RunScriptRequest::new(&layout, &name);
            if let Some(param) = param {
                request = request.param(&param);
            }
            let result = client.run_script(&request).await?;
            Ok(json!({"scriptResult": result.script_result, "scriptError": result.script_error}))
        }
        Command::Layouts => {
            let layouts = client.list_layouts().await?;
            Ok(Value::Array(
                layouts.into_iter().map(|l| Value::String(l.name)).collect(),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let info = match connection_info(&cli) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let client = match FmClient::new(info) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = run(&client, cli.command).await;
    // Close the session explicitly; the drop-time logout is best effort.
    if let Err(e) = client.logout().await {
        tracing::debug!(error = %e, "logout failed");
    }

    match outcome {
        Ok(value) => {
            println!("{value:#}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Version injected at compile time via CLOUDRES_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("CLOUDRES_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudres::config::Config;
use cloudres::format::{display_value, format_dict, format_list, Formatter};
use cloudres::resource::{
    find_min_match, find_resource, get_field, sort_items, Filter, Identifier, ResourceManager,
};
use cloudres::rest::{get_all_kind_keys, get_kind, RestManager};
use cloudres::util::{build_kwargs_dict, read_blob_file_contents};
use cloudres::wait::{
    wait_for_delete_outcome, wait_for_status_outcome, DeleteWait, ProgressFn, StatusWait,
    WaitOutcome,
};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Resolve, list and wait on cloud resources
#[derive(Parser, Debug)]
#[command(name = "cloudres", version = VERSION, about, long_about = None)]
struct Args {
    /// Base URL of the resource API
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Bearer token
    #[arg(long, global = true, conflicts_with = "token_file")]
    token: Option<String>,

    /// Read the bearer token from a file
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the known resource kinds
    Kinds,

    /// Resolve a resource by name or id and print it
    Show {
        kind: String,
        name_or_id: String,
        /// Restrict the lookup (repeatable key=value)
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,
    },

    /// List a collection
    List {
        kind: String,
        /// Sort specification, e.g. "status,name:desc"
        #[arg(long)]
        sort: Option<String>,
        /// Keep items whose field is at least this value (repeatable key=value)
        #[arg(long = "min", value_parser = parse_key_val)]
        minimums: Vec<(String, String)>,
    },

    /// Wait until a resource reaches a terminal status
    Wait {
        kind: String,
        name_or_id: String,
        /// Lower-case status meaning success (repeatable, default "active")
        #[arg(long = "success")]
        success: Vec<String>,
        /// Lower-case status meaning failure (repeatable, default "error")
        #[arg(long = "error")]
        error: Vec<String>,
        /// Field holding the status
        #[arg(long, default_value = "status")]
        status_field: String,
        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Wait until a resource is deleted
    WaitDelete {
        kind: String,
        id: String,
        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Store defaults in the config file
    Configure {
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        poll_interval: Option<u64>,
        #[arg(long)]
        delete_timeout: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudres {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("cloudres").join("cloudres.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cloudres").join("cloudres.log");
    }
    PathBuf::from("cloudres.log")
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

/// JSON literal when the text parses as one, plain string otherwise
fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn build_filter(pairs: &[(String, String)]) -> Filter {
    let mut filter = Filter::new();
    for (key, value) in pairs {
        filter.extend(build_kwargs_dict(key, Some(parse_value(value))));
    }
    filter
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();

    match &args.command {
        Command::Kinds => {
            let keys = get_all_kind_keys();
            let rows: Vec<Vec<Value>> = keys
                .iter()
                .filter_map(|key| get_kind(key).map(|kind| (key, kind)))
                .map(|(key, kind)| {
                    vec![
                        Value::String(key.to_string()),
                        Value::String(kind.display_name.clone()),
                        Value::String(kind.resource_kind.clone()),
                    ]
                })
                .collect();
            match args.format {
                OutputFormat::Table => print_table(&["Key", "Name", "Kind"], &rows),
                _ => print_structured(args.format, &keys)?,
            }
        }

        Command::Show {
            kind,
            name_or_id,
            filters,
        } => {
            let manager = connect(&args, &config, kind)?;
            let filter = build_filter(filters);
            let item = find_resource(&manager, &Identifier::from(name_or_id), &filter).await?;
            print_item(args.format, &item)?;
        }

        Command::List {
            kind,
            sort,
            minimums,
        } => {
            let manager = connect(&args, &config, kind)?;
            let items = manager.list().await?;
            let items = if minimums.is_empty() {
                sort_items(items, sort.as_deref())?
            } else {
                find_min_match(items, sort.as_deref(), &build_filter(minimums))?
            };
            print_collection(args.format, &manager, &items)?;
        }

        Command::Wait {
            kind,
            name_or_id,
            success,
            error,
            status_field,
            interval,
            timeout,
        } => {
            let manager = connect(&args, &config, kind)?;
            let item = find_resource(&manager, &Identifier::from(name_or_id), &Filter::new()).await?;
            let res_id = identifier_of(&item, manager.id_field())?;

            let mut opts = StatusWait {
                status_field: status_field.clone(),
                interval: interval.map(Duration::from_secs).unwrap_or(config.poll_interval()),
                timeout: timeout.map(Duration::from_secs),
                ..StatusWait::default()
            };
            if !success.is_empty() {
                opts.success_status = success.clone();
            }
            if !error.is_empty() {
                opts.error_status = error.clone();
            }

            let mut reporter = progress_reporter();
            let progress: ProgressFn<'_> = &mut reporter;
            let fetch = |id: Identifier| {
                let manager = manager.clone();
                async move { manager.show(&id).await }
            };
            let outcome = wait_for_status_outcome(fetch, &res_id, &opts, Some(progress)).await?;
            finish_wait(outcome, manager.kind().resource_kind.as_str(), &res_id)?;
        }

        Command::WaitDelete {
            kind,
            id,
            interval,
            timeout,
        } => {
            let manager = connect(&args, &config, kind)?;
            let res_id = Identifier::from(id);
            let opts = DeleteWait {
                interval: interval.map(Duration::from_secs).unwrap_or(config.poll_interval()),
                timeout: timeout.map(Duration::from_secs).unwrap_or(config.delete_timeout()),
                ..DeleteWait::default()
            };

            let mut reporter = progress_reporter();
            let progress: ProgressFn<'_> = &mut reporter;
            let outcome = wait_for_delete_outcome(&manager, &res_id, &opts, Some(progress)).await?;
            finish_wait(outcome, manager.kind().resource_kind.as_str(), &res_id)?;
        }

        Command::Configure {
            endpoint,
            poll_interval,
            delete_timeout,
        } => {
            let mut updated = config.clone();
            if endpoint.is_some() {
                updated.endpoint = endpoint.clone();
            }
            if poll_interval.is_some() {
                updated.poll_interval_secs = *poll_interval;
            }
            if delete_timeout.is_some() {
                updated.delete_timeout_secs = *delete_timeout;
            }
            updated.save().context("Failed to save configuration")?;
            println!("Configuration saved");
        }
    }

    Ok(())
}

/// Build a manager for `kind` from flags, environment and config
fn connect(args: &Args, config: &Config, kind: &str) -> Result<RestManager> {
    let Some(endpoint) = args.endpoint.clone().or_else(|| config.effective_endpoint()) else {
        bail!("No endpoint configured. Set CLOUDRES_ENDPOINT or use --endpoint");
    };

    let token = match (&args.token, &args.token_file) {
        (Some(token), _) => Some(token.clone()),
        (None, Some(path)) => Some(read_blob_file_contents(path)?),
        (None, None) => config.effective_token(),
    };

    tracing::info!("Using endpoint: {}, kind: {}", endpoint, kind);
    let manager = RestManager::new(&endpoint, token, kind)
        .with_context(|| format!("Cannot use resource kind '{}'", kind))?;
    Ok(manager)
}

fn identifier_of(item: &Value, id_field: &str) -> Result<Identifier> {
    match get_field(item, id_field)? {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Identifier::Int(i)),
            None => Ok(Identifier::Text(n.to_string())),
        },
        Value::String(s) => Ok(Identifier::Text(s)),
        other => bail!("Unusable {} value: {}", id_field, other),
    }
}

fn progress_reporter() -> impl FnMut(f64) + Send {
    |progress: f64| {
        eprint!("\rProgress: {:>3.0}%", progress);
        let _ = std::io::stderr().flush();
    }
}

fn finish_wait(outcome: WaitOutcome, kind: &str, res_id: &Identifier) -> Result<()> {
    eprintln!();
    match outcome {
        WaitOutcome::Success => println!("{} {} is ready", kind, res_id),
        WaitOutcome::Deleted => println!("{} {} deleted", kind, res_id),
        WaitOutcome::Error => bail!("{} {} went to an error status", kind, res_id),
        WaitOutcome::TimedOut => bail!("Timed out waiting for {} {}", kind, res_id),
    }
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_structured<T: serde::Serialize + ?Sized>(format: OutputFormat, data: &T) -> Result<()> {
    let text = match format {
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        _ => serde_json::to_string_pretty(data)?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn print_item(format: OutputFormat, item: &Value) -> Result<()> {
    if !matches!(format, OutputFormat::Table) {
        return print_structured(format, item);
    }
    let Some(fields) = item.as_object() else {
        println!("{}", display_value(item));
        return Ok(());
    };

    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();
    let rows: Vec<Vec<Value>> = keys
        .into_iter()
        .map(|key| vec![Value::String(key.clone()), flatten(&fields[key.as_str()])])
        .collect();
    print_table(&["Field", "Value"], &rows);
    Ok(())
}

fn print_collection(format: OutputFormat, manager: &RestManager, items: &[Value]) -> Result<()> {
    if !matches!(format, OutputFormat::Table) {
        return print_structured(format, items);
    }

    let kind = manager.kind();
    let formatters: HashMap<&str, Formatter> = kind
        .columns
        .iter()
        .map(|c| (c.field.as_str(), flatten as Formatter))
        .collect();
    let rows: Vec<Vec<Value>> = items.iter().map(|item| kind.row(item, &formatters)).collect();
    print_table(&kind.headers(), &rows);
    Ok(())
}

/// Collapse nested values to a single display string
fn flatten(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::String(format_dict(map)),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(display_value).collect();
            Value::String(format_list(&parts, cloudres::format::DEFAULT_SEPARATOR))
        }
        other => other.clone(),
    }
}

fn print_table(headers: &[&str], rows: &[Vec<Value>]) {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(display_value).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    println!("{}", table_line(headers.iter().copied(), &widths));
    for row in &cells {
        println!("{}", table_line(row.iter().map(|s| s.as_str()), &widths));
    }
}

fn table_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(v, w)| format!("{:<width$}", v, width = *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

//! Litestore CLI - CRUD over a configured SQLite model table

use clap::{Parser, Subcommand, ValueEnum};
use litestore::config::{self, LitestoreConfig};
use litestore::storage::{Connection, SqliteProxy};
use litestore::ui::{self, Icons};
use litestore::{FilterDescriptor, GrouperDescriptor, Operation, Proxy, Record, SorterDescriptor};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "litestore")]
#[command(version)]
#[command(about = "Model-agnostic CRUD storage proxy over embedded SQLite")]
#[command(long_about = r#"
Litestore keeps records of one configured model in a SQLite table:
  • Table layout derived from the model's fields
  • Additive schema migration on start-up
  • Filtered, sorted and paged reads
  • Per-record outcomes for batched writes

Example usage:
  litestore init
  litestore create --data '{"name": "Jo"}' --data '{"name": "Ann"}'
  litestore read --filter name=jo --sort name:desc --limit 10
  litestore update --id 1 --data '{"name": "Joanna"}'
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./litestore.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the database path from the config
    #[arg(short, long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Reconcile the table and show its column layout
    Schema {
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Insert records given as JSON objects
    Create {
        /// Record as a JSON object; repeat for several records
        #[arg(long = "data", required = true)]
        data: Vec<String>,

        /// Delete every existing row first
        #[arg(long)]
        full_rewrite: bool,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Query records
    Read {
        /// Filter as `property=value`, or with one of >=, <=, !=, <>, >, <
        #[arg(long)]
        filter: Vec<String>,

        /// Sort as `property` or `property:desc`
        #[arg(long)]
        sort: Vec<String>,

        /// Group by property
        #[arg(long)]
        group: Vec<String>,

        /// Compare `=` filters on text columns exactly instead of by substring
        #[arg(long)]
        exact: bool,

        /// Compare text with `=` instead of case-insensitive LIKE
        #[arg(long)]
        case_sensitive: bool,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<u64>,

        /// Number of records to skip
        #[arg(long)]
        start: Option<u64>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Update one record; inserts it if the row is gone
    Update {
        #[arg(long)]
        id: i64,

        /// Fields to change, as a JSON object
        #[arg(long)]
        data: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Delete records by id
    Destroy {
        #[arg(long = "id", required = true)]
        ids: Vec<i64>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Delete every row, keeping the table
    Truncate,

    /// Drop the table
    Drop,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let command = match cli.command {
        Commands::Init { force } => return run_init(cli.config, cli.database, force),
        command => command,
    };

    let mut config = config::load_config(cli.config.as_deref())?.unwrap_or_else(|| {
        tracing::debug!("No config file found, using the default people model");
        LitestoreConfig::default()
    });
    if let Some(database) = cli.database {
        config.database.name = database;
    }

    let conn = Connection::open(config.database.clone())?;
    let proxy = SqliteProxy::open(conn, config.model.table.clone(), config.model.to_model()).await;

    match command {
        Commands::Init { .. } => {}

        Commands::Schema { format } => {
            let report = proxy.reconcile().await?;
            if format == Format::Json {
                let output = json!({
                    "table": proxy.schema().table(),
                    "reconcile": report,
                    "columns": proxy.schema().columns(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                ui::header(&format!("{} ({})", proxy.schema().table(), config.database.name));
                ui::reconcile_report(proxy.schema().table(), &report);
                println!("{}", ui::schema_table(proxy.schema()));
            }
        }

        Commands::Create { data, full_rewrite, format } => {
            let records = data
                .iter()
                .map(|raw| parse_object(raw).map(Record::new))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let operation = Operation::create(records).with_full_rewrite(full_rewrite);
            report(&proxy, proxy.create(operation).await, format)?;
        }

        Commands::Read {
            filter,
            sort,
            group,
            exact,
            case_sensitive,
            limit,
            start,
            format,
        } => {
            let mut operation = Operation::read();
            for raw in &filter {
                let mut descriptor = parse_filter(raw)?;
                if exact {
                    descriptor = descriptor.exact();
                }
                if case_sensitive {
                    descriptor = descriptor.case_sensitive();
                }
                operation = operation.with_filter(descriptor);
            }
            for raw in &sort {
                operation = operation.with_sorter(parse_sorter(raw));
            }
            for property in group {
                operation = operation.with_grouper(GrouperDescriptor::new(property));
            }
            if let Some(limit) = limit {
                operation = operation.with_limit(limit);
            }
            if let Some(start) = start {
                operation = operation.with_start(start);
            }

            let operation = proxy.read(operation).await;
            if format == Format::Text && operation.is_successful() {
                ui::status(Icons::SEARCH, "Found", &format!("{} record(s)", operation.records().len()));
            }
            report(&proxy, operation, format)?;
        }

        Commands::Update { id, data, format } => {
            let record = Record::with_id(id, parse_object(&data)?);
            report(&proxy, proxy.update(Operation::update(vec![record])).await, format)?;
        }

        Commands::Destroy { ids, format } => {
            let records = ids.into_iter().map(|id| Record::with_id(id, Map::new())).collect();
            report(&proxy, proxy.destroy(Operation::destroy(records)).await, format)?;
        }

        Commands::Truncate => {
            proxy.truncate().await?;
            ui::success(&format!("Truncated {}", proxy.schema().table()));
        }

        Commands::Drop => {
            proxy.drop_table().await?;
            ui::status(Icons::DEL, "Dropped", proxy.schema().table());
        }
    }

    Ok(())
}

fn run_init(path: Option<PathBuf>, database: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config::default_config_path);
    let mut config = LitestoreConfig::default();
    if let Some(database) = database {
        config.database.name = database;
    }

    config::write_config(&path, &config, force)?;
    if !config.database.is_in_memory() {
        config::ensure_db_dir(Path::new(&config.database.name))?;
    }
    ui::success(&format!("Wrote {}", path.display()));
    ui::status(Icons::DATABASE, "Database", &config.database.name);
    Ok(())
}

/// Print a completed operation; fails the process when the operation failed
fn report(proxy: &SqliteProxy, operation: Operation, format: Format) -> anyhow::Result<()> {
    let id_property = proxy.model().id_property();

    if format == Format::Json {
        let output = json!({
            "kind": operation.kind().as_str(),
            "successful": operation.is_successful(),
            "exception": operation.exception().map(|e| e.to_string()),
            "failures": operation
                .failures()
                .iter()
                .map(|f| json!({"index": f.index, "error": f.error.to_string()}))
                .collect::<Vec<_>>(),
            "records": operation
                .records()
                .iter()
                .map(|r| r.to_json(id_property))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        ui::operation_outcome(&operation);
        if !operation.records().is_empty() {
            let columns: Vec<&str> = proxy.schema().columns().iter().map(|c| c.name.as_str()).collect();
            println!("{}", ui::records_table(id_property, &columns, operation.records()));
        }
    }

    if !operation.is_successful() {
        anyhow::bail!("{} did not complete successfully", operation.kind());
    }
    Ok(())
}

fn parse_object(raw: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(data) => Ok(data),
        other => anyhow::bail!("expected a JSON object, got {}", other),
    }
}

/// Values that parse as JSON keep their type; anything else is a string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

const OPERATORS: [&str; 7] = [">=", "<=", "!=", "<>", "=", ">", "<"];

fn parse_filter(raw: &str) -> anyhow::Result<FilterDescriptor> {
    // Earliest operator wins; at the same position the longer one does
    let Some((pos, op)) = OPERATORS
        .iter()
        .filter_map(|op| raw.find(op).map(|pos| (pos, *op)))
        .min_by_key(|(pos, op)| (*pos, std::cmp::Reverse(op.len())))
    else {
        anyhow::bail!("filter {:?} has no operator (expected property=value)", raw);
    };

    let property = raw[..pos].trim();
    if property.is_empty() {
        anyhow::bail!("filter {:?} has no property", raw);
    }
    let value = parse_value(raw[pos + op.len()..].trim());

    let descriptor = FilterDescriptor::new(property, value);
    Ok(if op == "=" { descriptor } else { descriptor.with_operator(op) })
}

fn parse_sorter(raw: &str) -> SorterDescriptor {
    match raw.split_once(':') {
        Some((property, direction)) => SorterDescriptor::new(property.trim(), direction.trim().to_uppercase()),
        None => SorterDescriptor::asc(raw.trim()),
    }
}

//! fmsql - run SQL against a FileMaker database through the Data API.

mod cli;

use anyhow::{bail, Context};
use cli::{Cli, OutputFormat};
use fmdata_sql::config::{Config, ConnectionConfig};
use fmdata_sql::logging::{self, LogTarget};
use fmdata_sql::params::{self, ParamKey};
use fmdata_sql::query::QueryKind;
use fmdata_sql::types::{Row, Value};
use fmdata_sql::{FmError, KeyringTokenStore, Session};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    logging::init(if cli.log_file {
        LogTarget::File
    } else {
        LogTarget::Stderr
    });

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<FmError>() {
            Some(fm) => error!("{}: {}", fm.category(), fm),
            None => error!("{e:#}"),
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    // Precedence: CLI arguments, then named or default connection, then environment
    let connection = resolve_connection(&cli, &config)?;
    let sql = read_sql(&cli)?;
    let bindings = cli.bindings().map_err(anyhow::Error::msg)?;

    let mut builder = Session::builder(connection.clone());
    if cli.keyring {
        let store = KeyringTokenStore::new(&connection.base_address()?);
        builder = builder.token_store(Arc::new(store));
    }
    let mut session = builder.connect().await?;

    if cli.transaction {
        run_transaction(&mut session, &sql, &bindings).await
    } else {
        run_single(&mut session, &sql, &bindings, cli.format).await
    }
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> anyhow::Result<ConnectionConfig> {
    let mut connection = match cli.connection_name() {
        Some(name) => config
            .get_connection(Some(name))
            .cloned()
            .with_context(|| format!("Connection '{name}' not found in config file"))?,
        None => config.get_connection(None).cloned().unwrap_or_default(),
    };

    if let Some(overrides) = cli.to_connection_config() {
        connection.merge(&overrides);
    }
    connection.apply_env_defaults();

    if connection.host.is_none() || connection.database.is_none() {
        bail!("No connection configured. Pass --host and --database, or use --help for usage information.");
    }
    Ok(connection)
}

fn read_sql(cli: &Cli) -> anyhow::Result<String> {
    let sql = match (&cli.sql, &cli.file) {
        (Some(sql), _) => sql.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SQL from {}", path.display()))?,
        (None, None) => bail!("No SQL given. Pass a statement or --file"),
    };
    if sql.trim().is_empty() {
        bail!("SQL text is empty");
    }
    Ok(sql)
}

async fn run_single(
    session: &mut Session,
    sql: &str,
    bindings: &[(ParamKey, Value)],
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut statement = session.prepare(sql.trim().trim_end_matches(';'));
    for (key, value) in bindings {
        statement.bind(key.clone(), value.clone());
    }
    statement.execute().await?;

    let is_select = statement
        .description()
        .is_some_and(|d| d.kind == QueryKind::Select);
    if !is_select {
        println!("{} row(s) affected", statement.row_count());
        return Ok(());
    }

    let columns = statement.column_names().to_vec();
    let rows = statement.fetch_all()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => print_table(&columns, &rows),
    }
    Ok(())
}

/// Queues every statement and replays them in order on commit.
async fn run_transaction(
    session: &mut Session,
    sql: &str,
    bindings: &[(ParamKey, Value)],
) -> anyhow::Result<()> {
    let statements = params::split_statements(sql);

    session.begin_transaction();
    for text in &statements {
        let mut statement = session.prepare(*text);
        for (key, value) in bindings {
            statement.bind(key.clone(), value.clone());
        }
        statement.execute().await?;
    }

    let queued = session.pending_len();
    session.commit().await?;
    println!("{queued} statement(s) committed");
    Ok(())
}

fn print_table(columns: &[String], rows: &[Row]) {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(Value::to_display_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", line(columns));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    );
    for row in &cells {
        println!("{}", line(row.as_slice()));
    }
    println!("({} row{})", rows.len(), if rows.len() == 1 { "" } else { "s" });
}

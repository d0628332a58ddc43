//!
//! conflux CLI binary
//! ------------------
//! Runs a serialized query plan against an in-memory hub seeded from JSON and
//! prints the result as a table or as JSON records.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use conflux::config::ExecConfig;
use conflux::datahub::{DataHub, HubSeed};
use conflux::planner::QueryPlan;
use conflux::session::Session;
use conflux::StepExecutor;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [run] --plan <plan.json> --data <seed.json> [--config <config.json>] [--database <db>] [--query <SQL>] [--json] [--no-cache]\n\nFlags:\n  --plan <path>       Query plan (steps, optional columns, query text)\n  --data <path>       Hub seed: integrations with tables, model projects\n  --config <path>     Executor config JSON; CONFLUX_* env vars apply otherwise\n  --database <db>     Current database for unqualified tables\n  --query <SQL>       Query text; a `FROM (...) AS virtual_table` wrapper becomes the outer query\n  --json              Print records as JSON instead of a table\n  --no-cache          Disable the prediction cache for this session\n  -h, --help          Show this help"
    );
}

struct Args {
    plan: PathBuf,
    data: PathBuf,
    config: Option<PathBuf>,
    database: Option<String>,
    query: Option<String>,
    json: bool,
    no_cache: bool,
}

fn parse_args(program: &str, args: impl Iterator<Item = String>) -> Result<Option<Args>> {
    let mut plan = None;
    let mut data = None;
    let mut config = None;
    let mut database = None;
    let mut query = None;
    let mut json = false;
    let mut no_cache = false;
    let mut args = args.peekable();
    if args.peek().map(|a| a == "run").unwrap_or(false) { args.next(); }
    while let Some(a) = args.next() {
        match a.as_str() {
            "--plan" => plan = args.next().map(PathBuf::from),
            "--data" => data = args.next().map(PathBuf::from),
            "--config" => config = args.next().map(PathBuf::from),
            "--database" => database = args.next(),
            "--query" | "-q" => query = args.next(),
            "--json" => json = true,
            "--no-cache" => no_cache = true,
            "-h" | "--help" => { print_usage(program); return Ok(None); }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }
    let (Some(plan), Some(data)) = (plan, data) else {
        print_usage(program);
        anyhow::bail!("--plan and --data are required");
    };
    Ok(Some(Args { plan, data, config, database, query, json, no_cache }))
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut argv = env::args();
    let program = argv.next().unwrap_or_else(|| "conflux".to_string());
    let Some(args) = parse_args(&program, argv)? else { return Ok(()) };

    let config = match &args.config {
        Some(p) => ExecConfig::from_json_file(p)?,
        None => ExecConfig::from_env(),
    };
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "conflux",
        "conflux starting: RUST_LOG='{}', plan='{}', data='{}', predictor_cache={}",
        rust_log, args.plan.display(), args.data.display(), config.predictor_cache
    );

    let text = std::fs::read_to_string(&args.plan)
        .with_context(|| format!("reading plan {}", args.plan.display()))?;
    let mut plan = QueryPlan::from_json(&text)?;
    if let Some(q) = &args.query { plan = plan.with_query_text(q); }

    let hub: std::sync::Arc<dyn DataHub> = HubSeed::from_json_file(&args.data)?.build()?;
    let mut session = Session::new(hub);
    if let Some(db) = &args.database { session = session.with_database(db); }
    if args.no_cache { session = session.without_predictor_cache(); }

    let out = StepExecutor::new(config).execute(&plan, &session, None).map_err(|e| {
        let err = conflux::AppError::classify(&e);
        anyhow::anyhow!("[{}] {}", err.mysql_code(), err)
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&out.data.get_records())?);
    } else {
        println!("{}", out.data.to_df()?);
    }
    let names: Vec<&str> = out.columns.iter().map(|c| c.alias.as_str()).collect();
    info!(target: "conflux", "{} rows, columns: {}", out.data.len(), names.join(", "));
    Ok(())
}

//! fgalist binary
//!
//! Answers one ListUsers query against a model and tuple fixture and prints
//! the JSON response.
//!
//! # Usage
//!
//! ```bash
//! fgalist --fixture model.json --object document:1 --relation viewer --user-filter user
//!
//! # With a config file and a condition context
//! fgalist --config config.yaml --fixture model.json --object document:1 \
//!     --relation viewer --user-filter user --context '{"region": "eu"}'
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use fgalist_cli::observability::init_logging;
use fgalist_cli::{AppConfig, Fixture, Runner};
use fgalist_domain::listusers::{ConsistencyPreference, ListUsersRequest, UserFilter};
use fgalist_domain::model::TupleKey;

/// fgalist - list the users related to an object
#[derive(Parser, Debug)]
#[command(name = "fgalist")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON fixture with the model and tuples
    #[arg(short, long)]
    fixture: PathBuf,

    /// Store the fixture is loaded into
    #[arg(long, default_value = "fixture")]
    store: String,

    /// Object to list users for ("type:id")
    #[arg(short, long)]
    object: String,

    /// Relation on the object
    #[arg(short, long)]
    relation: String,

    /// Subject filter ("type" or "type#relation"); repeatable
    #[arg(short = 'u', long = "user-filter", required = true)]
    user_filters: Vec<String>,

    /// Condition context as a JSON object
    #[arg(long)]
    context: Option<String>,

    /// Contextual tuple ("object#relation@user"); repeatable
    #[arg(long = "contextual-tuple")]
    contextual_tuples: Vec<String>,

    #[arg(long, value_enum, default_value_t = Consistency::Unspecified)]
    consistency: Consistency,

    /// Overrides listusers.max_results
    #[arg(long)]
    max_results: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Consistency {
    Unspecified,
    MinimizeLatency,
    HigherConsistency,
}

impl From<Consistency> for ConsistencyPreference {
    fn from(value: Consistency) -> Self {
        match value {
            Consistency::Unspecified => ConsistencyPreference::Unspecified,
            Consistency::MinimizeLatency => ConsistencyPreference::MinimizeLatency,
            Consistency::HigherConsistency => ConsistencyPreference::HigherConsistency,
        }
    }
}

/// Parses `object#relation@user`.
fn parse_contextual_tuple(raw: &str) -> anyhow::Result<TupleKey> {
    let (left, user) = raw
        .split_once('@')
        .with_context(|| format!("contextual tuple '{raw}' must be object#relation@user"))?;
    let (object, relation) = left
        .split_once('#')
        .with_context(|| format!("contextual tuple '{raw}' must be object#relation@user"))?;
    Ok(TupleKey::new(object, relation, user))
}

fn build_request(args: &Args) -> anyhow::Result<ListUsersRequest> {
    let user_filters = args
        .user_filters
        .iter()
        .map(|raw| {
            UserFilter::parse(raw).map_err(|e| anyhow::anyhow!("invalid user filter '{raw}': {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let context: HashMap<String, serde_json::Value> = match &args.context {
        Some(raw) => serde_json::from_str(raw).context("--context must be a JSON object")?,
        None => HashMap::new(),
    };

    let contextual_tuples = args
        .contextual_tuples
        .iter()
        .map(|raw| parse_contextual_tuple(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(
        ListUsersRequest::new(&args.store, &args.object, &args.relation, user_filters)
            .with_context(context)
            .with_contextual_tuples(contextual_tuples)
            .with_consistency(args.consistency.into()),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::from_env()?,
    };
    if let Some(max_results) = args.max_results {
        config.listusers.max_results = max_results;
    }

    init_logging(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting fgalist");

    let fixture = Fixture::from_path(&args.fixture)?;
    let request = build_request(&args)?;
    let runner = Runner::new(fixture, args.store.as_str(), config.listusers.to_domain()).await?;

    let response = runner.list_users(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

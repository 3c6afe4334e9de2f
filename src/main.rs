use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use relgraph::model::ResourceMatcherRangeResult;
use relgraph::{
    Config, Matcher, Model, PathFinder, QueryRequest, RecordedResponseClient, RelationCategory,
    ResourceMatcherQuery, ResourceType, SurrealGraphExecutor, SurrealQueryBuilder,
    TraversalDirection,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "relgraph")]
#[command(about = "Resolve temporal relations between monitored resources", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enumerate relation paths between two resource types
    Paths(PathsArgs),
    /// Print the SurrealQL compiled for a request
    Compile(CompileArgs),
    /// Resolve target matchers from a saved SurrealDB response
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
struct PathsArgs {
    source: String,
    target: String,

    /// Required waypoint types, comma separated, in order
    #[arg(long, value_delimiter = ',')]
    via: Vec<String>,

    #[arg(long)]
    max_hops: Option<usize>,

    /// Allowed relation categories: static, dynamic
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// Dynamic relation direction: outbound, inbound, both
    #[arg(long, default_value = "both")]
    direction: String,
}

#[derive(Args, Debug)]
struct CompileArgs {
    source: String,
    target: String,

    /// Source label filter, repeatable: --match key=value
    #[arg(long = "match", value_name = "KEY=VALUE")]
    matchers: Vec<String>,

    /// Unix timestamp (seconds or milliseconds); empty means now
    #[arg(long, default_value = "")]
    ts: String,

    /// Liveness window, e.g. 10m
    #[arg(long, default_value = "")]
    look_back: String,

    #[arg(long)]
    max_hops: Option<usize>,

    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// JSON response previously returned by SurrealDB for the compiled query
    response: PathBuf,
    source: String,
    target: String,

    #[arg(long = "match", value_name = "KEY=VALUE")]
    matchers: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    via: Vec<String>,

    #[arg(long, default_value = "default")]
    space_uid: String,

    #[arg(long, default_value = "")]
    look_back: String,

    /// Instant timestamp; ignored when --step is given
    #[arg(long, default_value = "")]
    ts: String,

    /// Range bucket width, e.g. 1m. Requires --start and --end
    #[arg(long)]
    step: Option<String>,

    #[arg(long, default_value = "")]
    start: String,

    #[arg(long, default_value = "")]
    end: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default()?;
    config.apply();

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.logging.log_level),
    )
    .init();

    match Cli::parse().command {
        Command::Paths(args) => run_paths(args),
        Command::Compile(args) => run_compile(args),
        Command::Resolve(args) => run_resolve(args).await,
    }
}

fn parse_matchers(pairs: &[String]) -> Result<Matcher> {
    pairs
        .iter()
        .map(|pair| {
            let (k, v) = pair
                .split_once('=')
                .with_context(|| format!("expected KEY=VALUE, got {:?}", pair))?;
            Ok((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

fn resource_types(names: &[String]) -> Vec<ResourceType> {
    names.iter().map(|n| ResourceType::from(n.trim())).collect()
}

fn run_paths(args: PathsArgs) -> Result<()> {
    let categories = args
        .categories
        .iter()
        .map(|c| c.parse::<RelationCategory>())
        .collect::<relgraph::Result<Vec<_>>>()?;
    let direction: TraversalDirection = args.direction.parse()?;

    let mut finder = PathFinder::new()
        .with_allowed_categories(&categories)
        .with_dynamic_direction(direction);
    if let Some(max_hops) = args.max_hops {
        finder = finder.with_max_hops(max_hops);
    }

    let source = ResourceType::from(args.source);
    let target = ResourceType::from(args.target);
    let paths = finder.find_all_paths(&source, &target, &resource_types(&args.via))?;

    for path in &paths {
        let mut line = path.steps[0].resource_type.to_string();
        for step in &path.steps[1..] {
            let relation = step
                .relation_type
                .as_ref()
                .map(|r| r.as_str())
                .unwrap_or_default();
            let direction = step.direction.map(|d| d.as_str()).unwrap_or_default();
            line.push_str(&format!(" -[{} {}]-> {}", relation, direction, step.resource_type));
        }
        println!("{}", line);
    }
    log::info!("{} paths from {} to {}", paths.len(), source, target);

    Ok(())
}

fn run_compile(args: CompileArgs) -> Result<()> {
    let timestamp = relgraph::model::parse_timestamp(&args.ts)?;
    let look_back_delta = relgraph::model::parse_duration_or(&args.look_back, 0)?;

    let request = QueryRequest {
        timestamp,
        source_type: ResourceType::from(args.source),
        source_info: parse_matchers(&args.matchers)?,
        target_type: ResourceType::from(args.target),
        max_hops: args.max_hops.unwrap_or_default(),
        look_back_delta,
        limit: args.limit.unwrap_or_default(),
        ..Default::default()
    };

    println!("{}", SurrealQueryBuilder::new(request).build());
    Ok(())
}

async fn run_resolve(args: ResolveArgs) -> Result<()> {
    let executor = SurrealGraphExecutor::new(RecordedResponseClient::new(&args.response));
    let model = Model::new(Arc::new(executor));

    let query = ResourceMatcherQuery {
        space_uid: args.space_uid,
        look_back_delta: args.look_back,
        source: ResourceType::from(args.source),
        target: ResourceType::from(args.target),
        index_matcher: parse_matchers(&args.matchers)?,
        path_resource: resource_types(&args.via),
    };

    match args.step {
        Some(step) => {
            let result: ResourceMatcherRangeResult = model
                .query_resource_matcher_range(&query, &step, &args.start, &args.end)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        None => {
            let result = model.query_resource_matcher(&query, &args.ts).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

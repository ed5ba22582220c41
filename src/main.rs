//! resource-tree - list local, object-store and remote resource hierarchies
//!
//! Thin command-line front end over the `resource_tree` library.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use resource_tree::config::{Config, ObjectStoreContext, RemoteContext, Settings};
use resource_tree::node::{Node, NodeFactory};
use resource_tree::remote::HttpListingClient;
use resource_tree::store::b2::B2Client;
use resource_tree::store::ResourceUri;
use resource_tree::strategy::{
    Filter, Labeler, LastModifiedSorter, LexicographicByNameSorter, NameLabeler, Sorter,
    WildcardMatchOnNameFilter,
};
use resource_tree::walk::{walk, WalkOptions};

/// CLI command
#[derive(Debug)]
enum Command {
    /// List the children of a collection
    List(ListArgs),
    /// Show help
    Help,
}

#[derive(Debug, Default)]
struct ListArgs {
    backend: Option<String>,
    filter: Option<String>,
    sort: Option<String>,
    recursive: bool,
    path: String,
}

fn print_help() {
    eprintln!(
        r#"resource-tree - List local, object-store and remote resource hierarchies

USAGE:
    resource-tree list [--backend TAG] [--filter GLOB] [--sort ORDER] [--recursive] PATH
    resource-tree help

OPTIONS:
    --backend TAG   Backend tag: file (default), s3, http, https
    --filter GLOB   Only show entries whose name matches GLOB (only * is special)
    --sort ORDER    name, name-desc or mtime (default: backend order)
    --recursive     Descend into sub-collections

PATH may contain * wildcards, e.g. /data/*/jan or s3://bucket/runs/2024*.
The backend is inferred from s3:// and http(s):// prefixes.

ENVIRONMENT:
    B2_KEY_ID                B2 application key ID (required for s3:// paths)
    B2_KEY                   B2 application key (required for s3:// paths)
    RESOURCE_TREE_SETTINGS   JSON settings file (cache sizes, timeouts)
    RUST_LOG                 Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "list" => parse_list(&args[2..]).map(Command::List),
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

fn parse_list(args: &[String]) -> Result<ListArgs> {
    let mut list = ListArgs::default();
    let mut path = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--backend" => list.backend = Some(value("--backend")?),
            "--filter" => list.filter = Some(value("--filter")?),
            "--sort" => list.sort = Some(value("--sort")?),
            "--recursive" | "-r" => list.recursive = true,
            flag if flag.starts_with("--") => return Err(anyhow!("Unknown option: {}", flag)),
            other => {
                if path.replace(other.to_string()).is_some() {
                    return Err(anyhow!("Only one PATH may be given"));
                }
            }
        }
    }

    list.path = path.ok_or_else(|| {
        anyhow!("Usage: resource-tree list [--backend TAG] [--filter GLOB] [--sort ORDER] [--recursive] PATH")
    })?;
    Ok(list)
}

/// Backend tag implied by a path's scheme
fn infer_backend(path: &str) -> &'static str {
    if path.starts_with("s3://") {
        "s3"
    } else if path.starts_with("https://") {
        "https"
    } else if path.starts_with("http://") {
        "http"
    } else {
        ""
    }
}

fn sorter_for(order: &str) -> Result<Box<dyn Sorter>> {
    let sorter: Box<dyn Sorter> = match order {
        "name" => Box::new(LexicographicByNameSorter::new(true)),
        "name-desc" => Box::new(LexicographicByNameSorter::new(false)),
        "mtime" => Box::new(LastModifiedSorter::new(true)),
        other => return Err(anyhow!("Unknown sort order: {}", other)),
    };
    Ok(sorter)
}

/// Wire up the backend contexts the chosen backend needs
fn build_config(
    backend: &str,
    path: &str,
    settings: &Settings,
) -> Result<(Config, Option<Arc<ObjectStoreContext>>)> {
    let mut config = Config::new();
    let mut object_store = None;

    match backend {
        "s3" => {
            let uri = ResourceUri::parse(path).context("Invalid object store path")?;
            let key_id = env::var("B2_KEY_ID").context("B2_KEY_ID is not set")?;
            let key = env::var("B2_KEY").context("B2_KEY is not set")?;

            let client = B2Client::authorize(&key_id, &key, uri.bucket(), settings.request_timeout())
                .context("Failed to authorize with B2")?;
            let context = Arc::new(
                ObjectStoreContext::new(Arc::new(client), settings)
                    .context("Failed to initialize file cache")?,
            );
            config = config.with_object_store(Arc::clone(&context));
            object_store = Some(context);
        }
        "http" | "https" => {
            let client = HttpListingClient::new(settings.request_timeout())
                .context("Failed to create listing client")?;
            config = config.with_remote(Arc::new(RemoteContext::new(Arc::new(client), settings)));
        }
        _ => {}
    }

    Ok((config, object_store))
}

fn describe(node: &Node, labeler: &dyn Labeler) -> String {
    let label = labeler.label(node).unwrap_or_else(|| node.path().to_string());
    match node.is_collection() {
        Ok(true) => format!("{}/", label),
        Ok(false) => match node.size() {
            Ok(Some(size)) => format!("{}  ({} bytes)", label, size),
            _ => label,
        },
        Err(e) => format!("{}  (error: {})", label, e),
    }
}

fn run_list(args: ListArgs) -> Result<()> {
    let settings = Settings::from_env().context("Failed to load settings")?;
    let backend = args
        .backend
        .clone()
        .unwrap_or_else(|| infer_backend(&args.path).to_string());
    debug!(backend = %backend, path = %args.path, "Listing");

    let (config, object_store) = build_config(&backend, &args.path, &settings)?;
    let factory = NodeFactory::default();
    let root = factory
        .create(&backend, &args.path, config)
        .with_context(|| format!("Cannot open {}", args.path))?;

    let filter = args.filter.as_deref().map(WildcardMatchOnNameFilter::new);
    let sorter = args.sort.as_deref().map(sorter_for).transpose()?;
    let labeler = NameLabeler::new();

    let options = WalkOptions {
        max_depth: if args.recursive { None } else { Some(0) },
        filter: filter.as_ref().map(|f| f as &dyn Filter),
        sorter: sorter.as_deref(),
    };

    let result = walk(&root, &options, |node, depth| {
        println!("{}{}", "  ".repeat(depth), describe(node, &labeler));
    });

    if let Some(context) = object_store {
        context.shutdown();
    }

    result.with_context(|| format!("Cannot list {}", args.path))
}

fn main() -> Result<()> {
    // Initialize logging
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command
    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    match command {
        Command::List(args) => {
            info!(path = %args.path, "Starting listing");
            run_list(args)?;
        }
        Command::Help => {
            print_help();
        }
    }

    Ok(())
}

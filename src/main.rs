mod app;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flow_navigator::config::NavigatorConfig;
use flow_navigator::ftree::{flow_format, load_network, serialize_ftree};
use flow_navigator::network::Network;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Hierarchical flow network file to open.
    input: PathBuf,

    /// JSON file overriding layout and zoom settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the network back out to this path and exit.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print the paths of nodes whose names match this regex and exit.
    #[arg(long)]
    search: Option<String>,

    /// Print subtree statistics for the root and exit.
    #[arg(long)]
    stats: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn read_network(path: &Path) -> Result<Network> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    load_network(&text).with_context(|| format!("failed to load {}", path.display()))
}

fn print_stats(network: &Network) {
    let root = network.root();
    let aggregates = network.aggregates(root);
    println!("leaves: {}", aggregates.total_children);
    println!("modules: {}", network.modules_breadth_first(root).len());
    println!("max node flow: {}", flow_format(aggregates.max_node_flow));
    println!("max node exit flow: {}", flow_format(aggregates.max_node_exit_flow));
    println!("max link flow: {}", flow_format(aggregates.max_link_flow));
    println!("max child count: {}", aggregates.max_node_count);
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => NavigatorConfig::load(path)?,
        None => NavigatorConfig::default(),
    };

    if args.export.is_some() || args.search.is_some() || args.stats {
        let mut network = read_network(&args.input)?;

        if args.stats {
            print_stats(&network);
        }

        if let Some(query) = &args.search {
            for hit in network.search(query) {
                if network.node(hit).is_leaf() {
                    println!("{}\t{}", network.node(hit).path, network.name(hit));
                }
            }
        }

        if let Some(path) = &args.export {
            std::fs::write(path, serialize_ftree(&network))
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "exported network");
        }
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([config.viewport.width, config.viewport.height]),
        ..Default::default()
    };

    eframe::run_native(
        "flow-navigator",
        options,
        Box::new(move |cc| Ok(Box::new(app::NavigatorApp::new(cc, args.input.clone(), config)))),
    )
    .map_err(|error| anyhow!("viewer failed: {error}"))
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless inspector for saved flow graphs.
//!
//! Loads a document (JSON, or RON by extension), reports its structure and
//! execution order, and optionally runs it with the built-in flow templates.

use clap::Parser;
use flowgraph_core::config::ConfigError;
use flowgraph_core::error::DocumentError;
use flowgraph_core::presets;
use flowgraph_core::{ExecutionError, GraphConfig, GraphController, GraphDocument, GraphEvent, NodeId};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph document (.json or .ron)
    document: PathBuf,

    /// Graph configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Execute the graph after loading it
    #[arg(long)]
    run: bool,

    /// Print the normalized document as JSON
    #[arg(long)]
    dump: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_document(path: &Path) -> Result<GraphDocument, CliError> {
    let source = read(path)?;
    let doc = match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => GraphDocument::from_ron(&source)?,
        _ => GraphDocument::from_json(&source)?,
    };
    Ok(doc)
}

fn run(args: &Args) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => GraphConfig::from_ron(&read(path)?)?,
        None => GraphConfig::default(),
    };
    let doc = load_document(&args.document)?;

    let mut controller = GraphController::new(config);
    for template in presets::templates() {
        controller.register_template(template);
    }

    controller.subscribe(|event| match event {
        GraphEvent::CycleDetected { node, upstream } => {
            println!("cycle: ignored dependency of {node} on {upstream}");
        }
        GraphEvent::NodeSkipped { node } => println!("skipped: {node}"),
        GraphEvent::NodeExecuted { node, index } => println!("ran #{index}: {node}"),
        _ => {}
    });
    controller.deserialize(&doc);

    let graph = controller.graph();
    println!(
        "{}: {} node(s), {} edge(s)",
        args.document.display(),
        graph.node_count(),
        graph.edge_count()
    );
    let plan = controller.execution_order();
    let order: Vec<&str> = plan.order.iter().map(NodeId::as_str).collect();
    println!("order: {}", order.join(" -> "));
    for cycle in &plan.dropped {
        println!("cycle: {} depends on {}", cycle.node, cycle.upstream);
    }

    if args.dump {
        println!("{}", controller.to_json()?);
    }

    if args.run {
        let report = futures::executor::block_on(controller.execute())?;
        println!(
            "executed {}/{} node(s), {} skipped",
            report.executed.len(),
            report.order.len(),
            report.skipped.len()
        );
    }
    Ok(())
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "flowgraph=info"
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into()),
    );
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

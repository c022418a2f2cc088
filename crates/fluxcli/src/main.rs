// crates/fluxcli/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use fluxcore::{FlowDefinition, NodeDef, NodeKind, RunStatus};
use fluxhost::hosts::MemoryHost;
use fluxruntime::{CompiledFlow, FlowRuntime};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flux")]
#[command(about = "Flux flow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flow file
    Run {
        /// Path to flow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// Begin at a specific trigger node instead of the start nodes
        #[arg(short, long)]
        trigger: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a flow file
    Validate {
        /// Path to flow JSON file
        file: PathBuf,
    },

    /// List the built-in node kinds
    Kinds,

    /// Create a new example flow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            trigger,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::WARN)
                    .init();
            }

            run_flow(file, input, trigger).await?;
        }

        Commands::Validate { file } => {
            validate_flow(file)?;
        }

        Commands::Kinds => {
            list_kinds();
        }

        Commands::Init { output } => {
            create_example_flow(output)?;
        }
    }

    Ok(())
}

async fn run_flow(file: PathBuf, input: Option<String>, trigger: Option<String>) -> Result<()> {
    println!("🚀 Loading flow from: {}", file.display());

    let flow_json = std::fs::read_to_string(&file)?;
    let flow: FlowDefinition = serde_json::from_str(&flow_json)?;

    println!("📋 Flow: {}", flow.name);
    println!("   Nodes: {}", flow.nodes.len());
    println!("   Edges: {}", flow.edges.len());
    println!();

    let input: Value = match input {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Value::Null,
    };

    let runtime = FlowRuntime::new(MemoryHost::new().into_api());
    runtime.register_flow(flow.clone());

    let result = match trigger {
        Some(node_id) => runtime.trigger(&flow, &node_id, input).await,
        None => runtime.execute(&flow, input).await,
    };

    for run in &result.execution_log {
        let marker = match run.status {
            RunStatus::Completed => "✅",
            RunStatus::Failed => "❌",
            RunStatus::Waiting => "⏳",
        };
        println!("  {} {} ({})", marker, run.node_name, run.node_type);
        if let Some(error) = &run.error {
            println!("     error: {}", error);
        }
    }

    println!();
    if result.success {
        println!("✨ Flow completed successfully");
    } else if let Some(error) = &result.error {
        println!("💥 Flow failed: {}", error);
    }

    if !result.logs.is_empty() {
        println!();
        println!("📜 Logs:");
        for entry in &result.logs {
            println!("   [{}] {}", entry.level.as_str(), entry.message);
        }
    }

    if !result.notifications.is_empty() {
        println!();
        println!("🔔 Notifications:");
        for note in &result.notifications {
            println!("   {}", note.message);
        }
    }

    if !result.variables.is_empty() {
        println!();
        println!("📤 Variables:");
        for (name, value) in &result.variables {
            println!("   {}: {}", name, value);
        }
    }

    Ok(())
}

fn validate_flow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating flow: {}", file.display());

    let flow_json = std::fs::read_to_string(&file)?;
    let flow: FlowDefinition = serde_json::from_str(&flow_json)?;
    let name = flow.name.clone();
    let nodes = flow.nodes.len();
    let edges = flow.edges.len();

    let compiled = CompiledFlow::compile(flow)?;

    println!("✅ Flow is valid:");
    println!("   Name: {}", name);
    println!("   Nodes: {}", nodes);
    println!("   Edges: {}", edges);
    if compiled.is_cyclic() {
        println!("   Note: graph contains cycles; the dispatch limit bounds execution");
    }

    Ok(())
}

fn list_kinds() {
    println!("📦 Built-in node kinds:");
    println!();

    let kinds: &[(NodeKind, &str)] = &[
        (NodeKind::Start, "passthrough entry point"),
        (NodeKind::ManualTrigger, "payload from literal config or script"),
        (NodeKind::WebhookTrigger, "entry point for webhook calls"),
        (NodeKind::ScheduleTrigger, "entry point for scheduled runs"),
        (NodeKind::Script, "run a script in the sandbox"),
        (NodeKind::SystemApi, "invoke a System API method by name"),
        (NodeKind::IfElse, "route true/false on a condition"),
        (NodeKind::Switch, "route case_<n>/default on an expression"),
        (NodeKind::ForLoop, "run the body a fixed number of times"),
        (NodeKind::WhileLoop, "run the body while a condition holds"),
        (NodeKind::Foreach, "run the loop body once per array element"),
        (NodeKind::ReadVariable, "read a flow variable"),
        (NodeKind::WriteVariable, "write a flow variable"),
        (NodeKind::Log, "write through the System API logger"),
        (NodeKind::LlmCall, "build a prompt and await the AI chat"),
        (NodeKind::Notification, "raise a notification (client only)"),
        (NodeKind::Tts, "speak text (client only)"),
        (NodeKind::Stt, "wait for a transcript (client only)"),
        (NodeKind::CallFlow, "invoke a registered sub-flow"),
        (NodeKind::RateLimit, "delay, throttle or debounce the edge"),
        (NodeKind::Comment, "no-op"),
        (NodeKind::Merge, "wait for all connected ports, emit aggregate"),
    ];

    for (kind, description) in kinds {
        println!("  • {}: {}", kind, description);
    }
}

fn create_example_flow(output: PathBuf) -> Result<()> {
    let mut flow = FlowDefinition::new("example-doubler", "Example doubler flow");
    flow.declare_variable("doubled", Value::Null);

    let start = flow.add_node(NodeDef::new("start", NodeKind::Start).with_name("Start"));
    let double = flow.add_node(
        NodeDef::new("double", NodeKind::Script)
            .with_name("Double the payload")
            .with_script("variables.doubled = (input.payload or 0) * 2\nreturn variables.doubled"),
    );
    let log = flow.add_node(
        NodeDef::new("log", NodeKind::Log)
            .with_name("Log result")
            .with_config("message", "doubled"),
    );

    flow.connect(start, "out", double.clone(), "in");
    flow.connect(double, "out", log, "in");

    let json = serde_json::to_string_pretty(&flow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example flow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  flux run --file {} --input '21'", output.display());

    Ok(())
}

use std::{fs, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relayflow::{Config, EngineBuilder, FlowError, GatewayServer, Result, Vars, WorkflowModel};

#[derive(Parser)]
#[command(name = "relayflow", version, about = "Event-driven workflow execution engine")]
struct Cli {
    /// Path to config file; defaults apply when it does not exist
    #[arg(short, long, env = "RELAYFLOW_CONFIG", default_value = "relayflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket gateway
    Serve {
        /// Overrides `gateway.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Validate a workflow definition
    Validate {
        /// Workflow JSON file
        workflow: PathBuf,
    },
    /// Run a workflow once and print the final execution
    Run {
        /// Workflow JSON file
        workflow: PathBuf,
        /// Inputs as a JSON object
        #[arg(short, long, default_value = "{}")]
        inputs: String,
    },
}

fn load_config(path: &PathBuf) -> Result<Config> {
    if path.exists() { Config::create(path) } else { Ok(Config::default()) }
}

fn load_workflow(path: &PathBuf) -> Result<WorkflowModel> {
    let data = fs::read_to_string(path).map_err(|e| FlowError::Io(format!("failed to read workflow {:?}: {}", path, e)))?;
    WorkflowModel::from_json(&data)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relayflow=info,warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve {
            bind,
        } => {
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            let gateway_config = config.gateway.clone();
            let engine = Arc::new(EngineBuilder::new().config(config).build()?);
            engine.launch()?;

            let signal_engine = engine.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("received ctrl-c, shutting down");
                    signal_engine.shutdown();
                }
            });

            GatewayServer::new(gateway_config, engine).run().await
        }
        Commands::Validate {
            workflow,
        } => {
            let model = load_workflow(&workflow)?;
            let engine = EngineBuilder::new().config(config).build()?;
            match engine.validate(&model) {
                Ok(graph) => {
                    println!("workflow '{}' is valid ({} nodes)", model.id, graph.node_count());
                    Ok(())
                }
                Err(e) => {
                    error!("{}", e);
                    Err(e)
                }
            }
        }
        Commands::Run {
            workflow,
            inputs,
        } => {
            let model = load_workflow(&workflow)?;
            let inputs: Vars = serde_json::from_str(&inputs)?;
            let engine = EngineBuilder::new().config(config).build()?;
            engine.launch()?;

            let execution_id = engine.execute_workflow(&model, inputs)?;
            let execution = engine.wait_for(&execution_id).await?;
            println!("{}", serde_json::to_string_pretty(&execution)?);
            engine.shutdown();
            Ok(())
        }
    }
}

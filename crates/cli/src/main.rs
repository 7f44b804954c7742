mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docflow_core::Payload;
use events::{EventBus, RunEvent};
use llm::{ChatClient, ChatClientConfig, LlmGenerator, LlmReviewer};
use orchestrator::documentation::{
    documentation_process, DocEvent, DocumentationCapabilities, DocumentationConfig,
    GENERATE_DOCUMENTATION,
};
use orchestrator::{
    ApprovalGate, FileStateStore, FixedApproval, ProcessDefinition, ProcessRunner, RunStatus,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use config::{DocflowConfig, StateConfig, CONFIG_FILE};
use console::{ConsoleApprovalGate, StdoutPublisher};

#[derive(Parser)]
#[command(name = "docflow")]
#[command(about = "Draft, proofread and publish product documentation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the documentation cycle for a product
    Run {
        product: String,

        #[arg(long)]
        max_revisions: Option<u32>,

        /// Approve escalated drafts without prompting
        #[arg(long)]
        auto_approve: bool,

        /// Persist step state under this directory
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Continue from the persisted state of an earlier run
        #[arg(long)]
        resume: Option<Uuid>,
    },
    /// Print the routing table and cycle warnings
    Graph,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = DocflowConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Run {
            product,
            max_revisions,
            auto_approve,
            state_dir,
            resume,
        } => {
            let options = RunOptions::merge(
                &config,
                product,
                max_revisions,
                auto_approve,
                state_dir,
                resume,
            )?;
            run(&config, options).await
        }
        Commands::Graph => graph(&config),
    }
}

struct RunOptions {
    product: String,
    max_revisions: u32,
    auto_approve: bool,
    state_dir: Option<PathBuf>,
    resume: Option<Uuid>,
}

impl RunOptions {
    /// Apply flags over the config file values.
    fn merge(
        config: &DocflowConfig,
        product: String,
        max_revisions: Option<u32>,
        auto_approve: bool,
        state_dir: Option<PathBuf>,
        resume: Option<Uuid>,
    ) -> Result<Self> {
        let state_dir = state_dir.or_else(|| config.state.dir.clone());
        if resume.is_some() && state_dir.is_none() {
            bail!("--resume needs a state directory: pass --state-dir or set [state] dir in the config");
        }

        Ok(Self {
            product,
            max_revisions: max_revisions.unwrap_or(config.process.max_revisions),
            auto_approve,
            state_dir,
            resume,
        })
    }
}

fn chat_client(config: &DocflowConfig, api_key: String) -> ChatClient {
    let mut client_config =
        ChatClientConfig::new(&config.llm.base_url, api_key, &config.llm.model);
    if let Some(temperature) = config.llm.temperature {
        client_config = client_config.with_temperature(temperature);
    }
    ChatClient::new(client_config)
}

fn build_process(
    client: ChatClient,
    approval: Arc<dyn ApprovalGate>,
    max_revisions: u32,
) -> Result<ProcessDefinition<DocEvent>> {
    let capabilities = DocumentationCapabilities {
        generator: Arc::new(LlmGenerator::new(client.clone())),
        reviewer: Arc::new(LlmReviewer::new(client)),
        approval,
        publisher: Arc::new(StdoutPublisher),
    };
    let process_config = DocumentationConfig::default().with_max_revisions(max_revisions);

    documentation_process(capabilities, process_config)
        .context("Failed to build the documentation process")
}

async fn run(config: &DocflowConfig, options: RunOptions) -> Result<()> {
    let api_key = config.api_key()?;
    let approval: Arc<dyn ApprovalGate> = if options.auto_approve {
        Arc::new(FixedApproval(true))
    } else {
        Arc::new(ConsoleApprovalGate)
    };

    let definition = build_process(chat_client(config, api_key), approval, options.max_revisions)?;
    for warning in definition.warnings() {
        tracing::warn!("{}", warning);
    }

    let bus = EventBus::new();
    let mut runner = ProcessRunner::new(Arc::new(definition)).with_event_bus(bus.clone());

    if let Some(dir) = &options.state_dir {
        tracing::info!("Persisting step state under {}", dir.display());
        runner = runner.with_state_store(Arc::new(FileStateStore::new(dir)));
    }
    if let Some(run_id) = options.resume {
        runner = runner.with_run_id(run_id);
    }

    let run_id = runner.run_id();
    let mut subscription = bus.subscribe_run(run_id);
    let progress = tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            report(&event);
        }
    });

    let cancel = runner.cancellation_handle();
    tracing::info!(%run_id, product = %options.product, "Starting documentation cycle");
    let handle = runner.start(Payload::Text(options.product));

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let outcome = handle.wait().await;
    interrupt.abort();
    drop(bus);
    if let Err(e) = progress.await {
        tracing::warn!("Progress reporter stopped: {}", e);
    }
    let outcome = outcome.context("Documentation run failed")?;

    for failure in &outcome.failures {
        eprintln!("  failed: {}.{}: {}", failure.step, failure.function, failure.error);
    }
    let revisions = outcome
        .state(GENERATE_DOCUMENTATION)
        .map(|state| state.revision_count())
        .unwrap_or(0);

    match (&outcome.status, &outcome.output) {
        (RunStatus::Cancelled, _) => println!("Run cancelled"),
        (_, Some(document)) => {
            println!();
            println!("Published '{}' after {} revision(s)", document.title(), revisions);
        }
        (_, None) => println!("Run finished without publishing ({} revision(s))", revisions),
    }
    println!("Run ID: {}", outcome.run_id);
    if options.state_dir.is_none() {
        println!(
            "State was not persisted; pass --state-dir (e.g. {}) to keep it",
            StateConfig::default_dir().display()
        );
    }

    Ok(())
}

fn report(event: &RunEvent) {
    match event {
        RunEvent::EventEmitted { source, event, .. } => {
            tracing::info!(step = %source, %event, "Step finished");
        }
        RunEvent::InvocationFailed {
            step,
            function,
            error,
            ..
        } => {
            tracing::warn!(%step, %function, %error, "Invocation failed");
        }
        RunEvent::RunFaulted { reason, .. } => {
            tracing::error!(%reason, "Run faulted");
        }
        other => tracing::debug!(?other, "Run event"),
    }
}

fn graph(config: &DocflowConfig) -> Result<()> {
    // Collaborators are never called while printing, so no key is needed.
    let definition = build_process(
        chat_client(config, String::new()),
        Arc::new(FixedApproval(false)),
        config.process.max_revisions,
    )?;

    println!("Process: {}", definition.name());
    println!(
        "  input  {} -> {}",
        definition.entry_event(),
        definition.entry_step()
    );
    for (source, event, target) in definition.router().routes() {
        println!("  {}.{} -> {}", source, event, target);
    }
    if let Some(output) = definition.output_step() {
        println!("  output {}", output);
    }

    if definition.warnings().is_empty() {
        println!("No unbounded cycles");
    } else {
        for warning in definition.warnings() {
            println!("warning: {}", warning);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "docflow=debug,orchestrator=debug,llm=debug"
    } else {
        "docflow=info,orchestrator=info,llm=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

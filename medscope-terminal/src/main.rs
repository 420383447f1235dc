mod commands;
mod render;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use medscope::{Audience, Highlight, SelectionChange, Workspace, WorkspaceConfig};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{Command, HELP};

/// Terminal front end for a MedScope document workspace.
#[derive(Parser, Debug)]
#[command(name = "medscope-terminal", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides config and MEDSCOPE_API_URL
    #[arg(long)]
    api_url: Option<String>,

    /// clinician, patient or researcher
    #[arg(long)]
    audience: Option<Audience>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

/// Defaults, then the YAML file, then the environment, then flags.
fn load_config(args: &Args) -> Result<WorkspaceConfig> {
    let config = match &args.config {
        Some(path) => WorkspaceConfig::from_yaml_file(path)?,
        None => WorkspaceConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(api_url) = &args.api_url {
        config.api_base_url = api_url.clone();
    }
    if let Some(audience) = args.audience {
        config.audience = audience;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    config.validate()?;
    Ok(config)
}

/// Accepts a document id or its 1-based number in the listing.
fn resolve_document(workspace: &Workspace, reference: &str) -> Result<String> {
    let ids = workspace.snapshot().registry.ids();
    if let Ok(number) = reference.parse::<usize>() {
        if let Some(id) = number.checked_sub(1).and_then(|index| ids.get(index)) {
            return Ok(id.clone());
        }
    }
    ids.into_iter()
        .find(|id| id == reference)
        .ok_or_else(|| anyhow!("no document `{}`; see `list`", reference))
}

async fn open_focused(workspace: &Workspace) -> Result<()> {
    match workspace.open_selected().await? {
        Some(_) => println!("{}", render::viewer(&workspace.snapshot().viewer)),
        None => println!("Focus moved on before the document resolved."),
    }
    Ok(())
}

fn print_last_message(workspace: &Workspace) {
    if let Some(message) = workspace.snapshot().chat.messages().last() {
        println!("{}", render::message(message));
    }
}

async fn execute(workspace: &Workspace, command: Command) -> Result<()> {
    match command {
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
        Command::Upload(path) => {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("not a file path: {}", path.display()))?
                .to_string();
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let id = workspace.upload(&file_name, bytes).await?;
            println!("Uploaded {}", id);
        }
        Command::List => println!("{}", render::documents(&workspace.snapshot())),
        Command::Select(reference) => {
            let id = resolve_document(workspace, &reference)?;
            match workspace.select(&id)? {
                SelectionChange::Focused(id) => {
                    println!("Focused {}", id);
                    open_focused(workspace).await?;
                }
                SelectionChange::Cleared => println!("Selection cleared."),
            }
        }
        Command::Delete(reference) => {
            let id = resolve_document(workspace, &reference)?;
            workspace.delete(&id).await?;
            println!("Deleted {}", id);
        }
        Command::Summarize(reference) => {
            let id = resolve_document(workspace, &reference)?;
            workspace.summarize(&id).await?;
            println!("{}", render::documents(&workspace.snapshot()));
        }
        Command::Related(reference) => {
            let id = resolve_document(workspace, &reference)?;
            println!("{}", render::related(&workspace.related_documents(&id).await?));
        }
        Command::Synthesize { kind, documents } => {
            let ids = if documents.is_empty() {
                workspace.snapshot().registry.ids()
            } else {
                documents
                    .iter()
                    .map(|reference| resolve_document(workspace, reference))
                    .collect::<Result<Vec<_>>>()?
            };
            println!("{}", render::synthesis(&workspace.synthesize(&ids, kind).await?));
        }
        Command::Open => open_focused(workspace).await?,
        Command::NextPage => println!("page {}", workspace.next_page()),
        Command::PreviousPage => println!("page {}", workspace.previous_page()),
        Command::GoToPage(page) => println!("page {}", workspace.go_to_page(page)),
        Command::ZoomIn => println!("zoom {:.0}%", workspace.zoom_in() * 100.0),
        Command::ZoomOut => println!("zoom {:.0}%", workspace.zoom_out() * 100.0),
        Command::Render(event) => {
            workspace.render_event(event);
            println!("{}", render::viewer(&workspace.snapshot().viewer));
        }
        Command::Explain {
            text,
            question,
            context,
        } => {
            workspace
                .explain(Highlight::new(text, context), &question)
                .await?;
            println!("{}", render::panel(workspace.snapshot().panel.state()));
        }
        Command::Evidence(text) => {
            workspace
                .source_evidence(Highlight::new(text.clone(), text))
                .await?;
            println!("{}", render::panel(workspace.snapshot().panel.state()));
        }
        Command::ClosePanel => {
            workspace.close_panel();
            println!("{}", render::panel(workspace.snapshot().panel.state()));
        }
        Command::Ask(question) => {
            workspace.send_chat(&question).await?;
            print_last_message(workspace);
        }
        Command::AskAll(question) => {
            let ids = workspace.snapshot().registry.ids();
            workspace.send_chat_across(&ids, &question).await?;
            print_last_message(workspace);
        }
        Command::Search(query) => {
            println!("{}", render::papers(&workspace.search_similar(&query, None).await?));
        }
        Command::Audience(None) => println!("audience: {}", workspace.audience()),
        Command::Audience(Some(audience)) => {
            workspace.set_audience(audience);
            println!("audience: {}", audience);
        }
        Command::Health => {
            let health = workspace.health().await?;
            println!(
                "{} (index ready: {})",
                health.status,
                health.faiss_ready.map_or("unknown".to_string(), |ready| ready.to_string())
            );
        }
        Command::State => println!("{}", serde_json::to_string_pretty(&workspace.snapshot())?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with command output
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_config(&args)?;
    let workspace = Workspace::connect(config)?;
    info!(
        "MedScope terminal using {} for {}",
        workspace.config().api_base_url,
        workspace.audience()
    );

    match workspace.health().await {
        Ok(health) if health.is_ok() => info!("Backend healthy"),
        Ok(health) => warn!("Backend reports status {}", health.status),
        Err(e) => warn!("Backend not reachable yet: {}", e),
    }

    println!("Type `help` for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("medscope> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match Command::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = execute(&workspace, command).await {
                    println!("error: {:#}", e);
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    Ok(())
}

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing::info;
use tutorboard::api::{ApiError, HttpWhiteboardApi, WhiteboardApi};
use tutorboard::config::Config;
use tutorboard::latex::{self, LatexError, LiveLine};
use tutorboard::layout::{self, FileStore, LayoutError};
use tutorboard::quadrant::{BoardId, QuadrantIndex, ViewMode};
use tutorboard::sync::{self, SyncError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("invalid LaTeX: {0}")]
    Latex(#[from] LatexError),
    #[error("quadrant must be 0-3, got {0}")]
    InvalidQuadrant(usize),
    #[error("failed to read {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "tutorboard", about = "Tutoring whiteboard persistence CLI")]
struct Cli {
    #[arg(long, env = "TUTORBOARD_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "TUTORBOARD_USER")]
    user: Option<String>,

    #[arg(long, env = "TUTORBOARD_LAYOUT_PATH")]
    layout_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List persisted boards.
    List,
    /// Print one board record.
    Show { board_id: String },
    /// Create a board, empty or from a content JSON file.
    Create {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, help = "Board content JSON file")]
        content: Option<PathBuf>,
    },
    /// Change a board's title, keeping its content.
    Rename {
        board_id: String,
        #[arg(long)]
        title: String,
    },
    /// Upload a file attachment.
    Upload {
        path: PathBuf,
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },
    /// Check a formula, or render a multi-line live layer source.
    CheckLatex {
        source: String,
        #[arg(long, default_value_t = false)]
        live: bool,
    },
    Layout(LayoutCommand),
}

#[derive(Args, Debug)]
struct LayoutCommand {
    #[command(subcommand)]
    command: LayoutSubcommand,
}

#[derive(Subcommand, Debug)]
enum LayoutSubcommand {
    /// Print the stored layout.
    Show,
    /// Put a board in a quadrant of the stored layout.
    Assign { quadrant: usize, board_id: String },
    /// Empty a quadrant of the stored layout.
    Clear { quadrant: usize },
    /// Switch between single and quad view.
    View {
        #[arg(value_parser = ["single", "quad"])]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(user) = cli.user {
        config.user = user;
    }
    if let Some(layout_path) = cli.layout_path {
        config.layout_path = layout_path;
    }

    match cli.command {
        Command::CheckLatex { source, live } => run_check_latex(&source, live),
        Command::Layout(layout) => run_layout(&config, layout),
        command => run_api(&config, command).await,
    }
}

async fn run_api(config: &Config, command: Command) -> Result<(), CliError> {
    let api = HttpWhiteboardApi::new(&config.base_url)?;
    match command {
        Command::List => {
            let boards = sync::list_boards(&api).await?;
            print_json(&serde_json::to_value(boards)?)
        }
        Command::Show { board_id } => {
            let record = api.get_board(&BoardId::from(board_id.as_str())).await?;
            print_json(&serde_json::to_value(record)?)
        }
        Command::Create { title, content } => {
            let id = match content {
                None => sync::create_empty_board(&api, &title, &config.user).await?,
                Some(path) => {
                    let raw = read_file(&path)?;
                    let content = serde_json::from_str(&raw)?;
                    let title = if title.trim().is_empty() { tutorboard::consts::DEFAULT_TITLE } else { title.trim() };
                    api.create_board(title, &content, &config.user).await?.id
                }
            };
            info!(board_id = %id, "board created");
            print_json(&json!({ "id": id }))
        }
        Command::Rename { board_id, title } => {
            let id = BoardId::from(board_id.as_str());
            let record = api.get_board(&id).await?;
            api.update_board(&id, &title, &record.content).await?;
            print_json(&json!({ "id": id, "title": title }))
        }
        Command::Upload { path, mime } => {
            let bytes = std::fs::read(&path).map_err(|source| CliError::ReadFile { path: path.clone(), source })?;
            let file_name = path.file_name().map_or_else(|| "upload".to_owned(), |n| n.to_string_lossy().into_owned());
            let url = api.upload_attachment(&file_name, &mime, bytes).await?;
            print_json(&json!({ "url": url }))
        }
        Command::CheckLatex { .. } | Command::Layout(_) => Ok(()),
    }
}

fn run_check_latex(source: &str, live: bool) -> Result<(), CliError> {
    if !live {
        latex::validate(source)?;
        println!("ok");
        return Ok(());
    }
    for (n, line) in latex::render_live_layer(source).into_iter().enumerate() {
        match line {
            LiveLine::Blank => println!("{n:>3}"),
            LiveLine::Math { markup, .. } => println!("{n:>3} ok  {markup}"),
            LiveLine::Raw(raw) => println!("{n:>3} raw {raw}"),
        }
    }
    Ok(())
}

fn run_layout(config: &Config, layout_cmd: LayoutCommand) -> Result<(), CliError> {
    let mut store = FileStore::new(&config.layout_path);
    let mut state = layout::load_layout(&store);
    match layout_cmd.command {
        LayoutSubcommand::Show => return print_json(&serde_json::to_value(&state)?),
        LayoutSubcommand::Assign { quadrant, board_id } => {
            let q = parse_quadrant(quadrant)?;
            state.quadrant_ids[q.index()] = Some(BoardId::from(board_id.as_str()));
        }
        LayoutSubcommand::Clear { quadrant } => {
            let q = parse_quadrant(quadrant)?;
            state.quadrant_ids[q.index()] = None;
        }
        LayoutSubcommand::View { mode } => {
            state.view_mode = if mode == "quad" { ViewMode::Quad } else { ViewMode::Single };
        }
    }
    layout::save_layout(&mut store, &state)?;
    info!(path = %store.path().display(), "layout saved");
    print_json(&serde_json::to_value(&state)?)
}

fn parse_quadrant(raw: usize) -> Result<QuadrantIndex, CliError> {
    QuadrantIndex::new(raw).ok_or(CliError::InvalidQuadrant(raw))
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::ReadFile { path: path.to_path_buf(), source })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

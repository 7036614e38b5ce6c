//! vpin CLI
//!
//! Command-line frontend for the highscore tracking core: installation
//! overview, one-shot score listing, and a watch mode that runs the
//! service and prints change notifications.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use vpin_core::{Game, HighscoreChangedEvent};
use vpin_lib::{
    HighscoreManager, InstallPaths, Paths, ProcessRunner, Services,
    dispatcher::HighscoreChangeListener, scan_tables,
};

#[derive(Parser)]
#[command(name = "vpin")]
#[command(about = "Track virtual-pinball highscores", long_about = None)]
struct Cli {
    /// Visual Pinball installation folder (defaults to $VPIN_INSTALL_DIR)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved installation layout
    Info,

    /// List the current highscores of all tables
    Scores {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run the tracking service and print change notifications
    Watch,
}

fn resolve_root(cli_root: Option<PathBuf>) -> PathBuf {
    cli_root
        .or_else(|| std::env::var_os("VPIN_INSTALL_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("C:/vPinball/VisualPinball"))
}

fn build_services(paths: &InstallPaths) -> Result<Services, std::io::Error> {
    let catalog = scan_tables(&paths.tables_folder(), &paths.nvram_folder())?;
    Ok(Services {
        paths: Arc::new(paths.clone()),
        runner: Arc::new(ProcessRunner),
        catalog: Arc::new(catalog),
    })
}

struct PrintListener;

impl HighscoreChangeListener for PrintListener {
    fn highscore_changed(&self, event: &HighscoreChangedEvent) {
        let initials = event
            .current
            .as_ref()
            .and_then(|h| h.user_initials())
            .unwrap_or("-");
        let points = event
            .current
            .as_ref()
            .and_then(|h| h.top_points())
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("highscore changed: game {} -> {initials} {points}", event.game_id);
    }

    fn shutting_down(&self) {
        println!("service shutting down");
    }
}

async fn list_scores(services: Services, json: bool) -> Result<(), std::io::Error> {
    let manager = HighscoreManager::new(services.clone());

    let mut games: Vec<Game> = services.catalog.games();
    games.sort_by_key(|g| g.last_played_or_now());

    let mut entries = Vec::new();
    for game in &games {
        if let Some(highscore) = manager.get_highscore(game).await {
            entries.push((game.clone(), highscore));
        }
    }

    if json {
        let payload: Vec<serde_json::Value> = entries
            .iter()
            .map(|(game, highscore)| {
                serde_json::json!({
                    "id": game.id,
                    "table": game.display_name,
                    "rom": game.rom,
                    "highscore": highscore,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (game, highscore) in &entries {
            println!("{}", game.display_name);
            for score in &highscore.scores {
                println!("  {}) {:<8} {}", score.rank, score.initials, score.points);
            }
        }
        println!("{} of {} tables have highscores", entries.len(), games.len());
    }

    manager.shutdown().await;
    Ok(())
}

async fn watch(services: Services) -> Result<(), std::io::Error> {
    let manager = HighscoreManager::new(services);
    manager.add_listener(Arc::new(PrintListener));
    if let Err(err) = manager.start() {
        log::error!("Failed to start the file watcher: {err}");
        return Err(std::io::Error::other(err.to_string()));
    }
    log::info!("Watching for highscore changes, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    manager.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let root = resolve_root(cli.root);
    let paths = InstallPaths::new(&root);

    let result = match cli.command {
        Commands::Info => {
            println!("{}", paths.installation_overview());
            Ok(())
        }
        Commands::Scores { json } => match build_services(&paths) {
            Ok(services) => list_scores(services, json).await,
            Err(err) => Err(err),
        },
        Commands::Watch => match build_services(&paths) {
            Ok(services) => watch(services).await,
            Err(err) => Err(err),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

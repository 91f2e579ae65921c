//! flashcard-sync: push markdown flashcards to a record store.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flashcard_core::{parse_document, FlashcardRecord};
use flashcard_sync::{Config, DryRun, SyncEngine, VaultStore};

#[derive(Parser, Debug)]
#[command(name = "flashcard-sync")]
#[command(about = "Sync markdown flashcards with Anki")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a config file
    #[arg(long, global = true, env = "FLASHCARD_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync every flashcard in the vault
    Sync {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Path to the vault directory
        #[arg(short, long, env = "FLASHCARD_SYNC_VAULT")]
        vault: Option<PathBuf>,

        /// Group for documents without one in their front matter
        #[arg(long, env = "FLASHCARD_SYNC_DEFAULT_DECK")]
        default_deck: Option<String>,

        /// Show what would change without touching the store or the vault
        #[arg(long)]
        dry_run: bool,
    },
    /// Check the record store is reachable
    Check {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Print the flashcards found in one document
    Parse {
        file: PathBuf,

        /// Group to report the cards under
        #[arg(long, default_value = "Default")]
        deck: String,
    },
}

#[derive(Args, Debug)]
struct RemoteArgs {
    /// Record store URL
    #[arg(long, env = "FLASHCARD_SYNC_URL")]
    url: Option<String>,

    /// Key required by the record store, if any
    #[arg(long, env = "FLASHCARD_SYNC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl RemoteArgs {
    fn apply(self, config: &mut Config) {
        if let Some(url) = self.url {
            config.anki_url = url;
        }
        if let Some(key) = self.api_key {
            config.api_key = Some(key);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG, defaults to info (or debug with --verbose)
    let default_filter = if cli.verbose {
        "info,flashcard_sync=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Sync {
            remote,
            vault,
            default_deck,
            dry_run,
        } => {
            remote.apply(&mut config);
            if let Some(vault) = vault {
                config.vault = vault;
            }
            if default_deck.is_some() {
                config.default_deck = default_deck;
            }
            run_sync(config, dry_run).await
        }
        Command::Check { remote } => {
            remote.apply(&mut config);
            let engine = SyncEngine::from_config(config)?;
            let version = engine
                .check_connectivity()
                .await
                .with_context(|| format!("contacting {}", engine.config().anki_url))?;
            println!("{} is reachable (API version {version})", engine.config().anki_url);
            Ok(())
        }
        Command::Parse { file, deck } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let lines: Vec<&str> = content.lines().collect();
            print_cards(&parse_document(&lines, &deck));
            Ok(())
        }
    }
}

async fn run_sync(config: Config, dry_run: bool) -> Result<()> {
    info!("Vault path: {:?}", config.vault);
    info!("Record store: {}", config.anki_url);

    let store = VaultStore::new(config.vault.clone(), config.deck_key.clone());
    let engine = SyncEngine::from_config(config)?;

    if dry_run {
        let report = engine.dry_run(&store).await?;
        print_dry_run(&report);
        return Ok(());
    }

    // Ctrl-C before submission starts aborts cleanly
    let canceller = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let summary = engine.sync(&store).await?;
    println!(
        "added {}, modified {}, deleted {}",
        summary.added, summary.modified, summary.deleted
    );
    Ok(())
}

fn print_cards(cards: &[FlashcardRecord]) {
    for card in cards {
        let id = card
            .identifier
            .map_or_else(|| "new".to_string(), |id| id.to_string());
        println!("line {} [{}] {}", card.line_index + 1, id, card.title);
        for line in card.fields.back.lines() {
            println!("    {line}");
        }
    }
    println!("{} flashcard(s)", cards.len());
}

fn print_dry_run(report: &DryRun) {
    let batch = &report.plan.batch;
    for origin in &report.plan.origins {
        let doc = &report.documents[origin.document];
        let card = &doc.cards[origin.card];
        println!("create  {}:{} {}", doc.handle, card.line_index + 1, card.title);
    }
    for (id, _) in &batch.update_fields {
        println!("update  {id}");
    }
    for (id, group) in &batch.change_group {
        println!("move    {id} -> {group}");
    }
    for id in &batch.add_tag {
        println!("tag     {id}");
    }
    for id in &batch.delete {
        println!("delete  {id}");
    }
    let summary = report.plan.summary;
    println!(
        "would add {}, modify {}, delete {}",
        summary.added, summary.modified, summary.deleted
    );
}

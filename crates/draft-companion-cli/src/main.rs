//! Draft companion — entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use rand::rngs::StdRng;
use rand::SeedableRng;

use draft_companion::account::{sort_candidates, top_upgrades};
use draft_companion::{classify, DropTable, ScoredEntity};
use draft_companion_cli::config::{cache_config_from_env, resolve_api_url, resolve_snapshot_path};
use draft_companion_cli::output;
use draft_companion_cli::session::CompanionSession;

#[derive(Parser)]
#[command(
    name = "draft-companion",
    about = "Companion for the draft simulator: draft advice, tier lists, upgrades, star drops",
    version
)]
struct Cli {
    /// Path to .dcsn snapshot file.
    #[arg(short, long, global = true)]
    snapshot: Option<String>,

    /// Backend base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the tier list for a map, or for a JSON file of scores.
    Tiers {
        /// Map name.
        map: Option<String>,

        /// JSON file holding `[[name, score], ...]`.
        #[arg(short, long, conflicts_with = "map")]
        file: Option<PathBuf>,

        /// Fetch fresh tier data even if the snapshot has some.
        #[arg(long)]
        refresh: bool,

        /// Also load every shown brawler image into the cache.
        #[arg(long)]
        preload: bool,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Build a draft board and ask the backend for the best next picks.
    ///
    /// Example:
    ///   draft-companion draft "Hard Rock Mine" --a shelly,colt --b bull --ban piper
    Draft {
        /// Map name.
        map: String,

        /// Team A picks, comma separated.
        #[arg(long, value_delimiter = ',')]
        a: Vec<String>,

        /// Team B picks, comma separated.
        #[arg(long, value_delimiter = ',')]
        b: Vec<String>,

        /// Banned brawlers, comma separated (at most 6).
        #[arg(long, value_delimiter = ',')]
        ban: Vec<String>,

        /// Player tag to limit suggestions to an account; remembered for
        /// later runs.
        #[arg(long)]
        tag: Option<String>,

        /// Ignore the remembered player tag.
        #[arg(long, conflicts_with = "tag")]
        no_account: bool,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show upgrade recommendations for an account.
    Upgrades {
        /// Player tag; defaults to the remembered one.
        tag: Option<String>,

        /// Column to sort by (score, total_power_points, total_coins, ...).
        #[arg(long, default_value = "score")]
        sort: String,

        /// Sort ascending instead of descending.
        #[arg(long)]
        asc: bool,

        /// Only show the best rated N brawlers.
        #[arg(long)]
        top: Option<usize>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Load images into the cache. Without sources, loads the whole catalog.
    Preload {
        /// URLs, data URLs or file paths.
        sources: Vec<String>,
    },

    /// Simulate opening star drops.
    StarDrop {
        /// Number of drops to open.
        #[arg(short, long, default_value_t = 1)]
        count: usize,

        /// Seed for a reproducible run.
        #[arg(long)]
        seed: Option<u64>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Fetch the catalog and tier data into the snapshot.
    Sync {
        /// Limit tier data to these maps.
        #[arg(short, long)]
        map: Vec<String>,
    },

    /// Validate a .dcsn snapshot file.
    Validate,

    /// Print resolved configuration and snapshot contents as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   draft-companion completions bash > ~/.local/share/bash-completion/completions/draft-companion
    ///   draft-companion completions zsh > ~/.zfunc/_draft-companion
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let snapshot_path = resolve_snapshot_path(cli.snapshot.as_deref());
    let api_url = resolve_api_url(cli.api_url.as_deref());

    match cli.command {
        Commands::Tiers {
            map,
            file,
            refresh,
            preload,
            json,
        } => {
            let mut session = open_session(&snapshot_path, &api_url)?;
            let list = match (file, map) {
                (Some(file), _) => {
                    let raw = std::fs::read_to_string(&file)?;
                    let scores: Vec<ScoredEntity> = serde_json::from_str(&raw)?;
                    classify(&scores)
                }
                (None, Some(map)) => match session.tier_list(&map, refresh).await {
                    Ok(list) => list,
                    Err(e) => exit_with(&e),
                },
                (None, None) => {
                    eprintln!("Error: give a map name or --file");
                    std::process::exit(2);
                }
            };

            if preload {
                let report = session.preload_tiers(&list).await;
                eprintln!("{}", output::preload_report(&report));
            }

            if json {
                let rows = list.with_roster(&session.snapshot().catalog.brawlers);
                let out = serde_json::json!({ "tiers": list, "rows": rows });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print!("{}", output::tier_list(&list));
            }
        }

        Commands::Draft {
            map,
            a,
            b,
            ban,
            tag,
            no_account,
            json,
        } => {
            let mut session = open_session(&snapshot_path, &api_url)?;
            let tag = match tag {
                Some(raw) => Some(session.set_player_tag(&raw).unwrap_or_else(|e| exit_with(&e))),
                None if no_account => None,
                None => session.player_tag(),
            };
            let board = session
                .build_board(&map, &a, &b, &ban)
                .unwrap_or_else(|e| exit_with(&e));
            let advice = session
                .advise(&board, tag.as_ref())
                .await
                .unwrap_or_else(|e| exit_with(&e));

            if json {
                let out = serde_json::json!({
                    "board": board,
                    "advice": advice,
                    "verdict": advice.win_rate.map(|r| draft_companion::WinRateBand::of(r).message()),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print!("{}", output::draft_board(&board));
                println!();
                print!("{}", output::draft_advice(&advice, board.is_complete()));
            }
        }

        Commands::Upgrades {
            tag,
            sort,
            asc,
            top,
            json,
        } => {
            let mut session = open_session(&snapshot_path, &api_url)?;
            let tag = match tag {
                Some(raw) => session.set_player_tag(&raw).unwrap_or_else(|e| exit_with(&e)),
                None => match session.player_tag() {
                    Some(tag) => tag,
                    None => {
                        eprintln!("Error: give a player tag, none is remembered");
                        std::process::exit(2);
                    }
                },
            };
            let mut rows = session.upgrades(&tag).await.unwrap_or_else(|e| exit_with(&e));
            match top {
                Some(n) => rows = top_upgrades(&rows, n),
                None => sort_candidates(&mut rows, &sort, !asc),
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("  {tag}");
                print!("{}", output::upgrades(&rows));
            }
        }

        Commands::Preload { sources } => {
            let session = open_session(&snapshot_path, &api_url)?;
            let report = if sources.is_empty() {
                session.preload_roster().await
            } else {
                session.cache().preload_all(&sources).await
            };
            println!("{}", output::preload_report(&report));
            println!("{}", output::cache_stats(&session.cache().stats()));
        }

        Commands::StarDrop { count, seed, json } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let summary = DropTable::standard().simulate(count, &mut rng)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", output::drop_summary(&summary));
            }
        }

        Commands::Sync { map } => {
            let mut session = open_session(&snapshot_path, &api_url)?;
            match session.sync(&map).await {
                Ok(report) => {
                    session.save()?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Err(e) => exit_with(&e),
            }
        }

        Commands::Validate => match CompanionSession::open(
            &snapshot_path,
            &api_url,
            cache_config_from_env(),
        ) {
            Ok(session) => {
                println!("Valid snapshot: {snapshot_path}");
                print!("{}", output::snapshot_summary(session.snapshot()));
            }
            Err(e) => {
                eprintln!("Invalid snapshot: {e}");
                std::process::exit(e.exit_code());
            }
        },

        Commands::Info => {
            let session = open_session(&snapshot_path, &api_url)?;
            let config = session.cache().config();
            let snapshot = session.snapshot();
            let info = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "snapshot_path": snapshot_path,
                "api_url": api_url,
                "cache": {
                    "timeout_secs": config.timeout.as_secs(),
                    "max_asset_bytes": config.max_asset_bytes,
                    "verify_decode": config.verify_decode,
                },
                "brawlers": snapshot.catalog.brawlers.len(),
                "maps": snapshot.catalog.maps.len(),
                "tier_maps": snapshot.tier_data.keys().collect::<Vec<_>>(),
                "latest_version": snapshot.latest_version.as_ref().map(|v| &v.version),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "draft-companion", &mut std::io::stdout());
        }

        Commands::Repl => {
            let session = open_session(&snapshot_path, &api_url)?;
            let handle = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || draft_companion_cli::repl::run(session, handle))
                .await??;
        }
    }

    Ok(())
}

fn open_session(snapshot_path: &str, api_url: &str) -> anyhow::Result<CompanionSession> {
    Ok(CompanionSession::open(
        snapshot_path,
        api_url,
        cache_config_from_env(),
    )?)
}

fn exit_with(e: &draft_companion_cli::types::CliError) -> ! {
    eprintln!("Error: {e}");
    std::process::exit(e.exit_code());
}

//! Interactive REPL for the draft companion.
//!
//! Launch with `draft-companion repl` to enter interactive mode.
//! Type `/help` for available commands, Tab for completion.

use rand::thread_rng;
use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};
use tokio::runtime::Handle;

use draft_companion::account::top_upgrades;
use draft_companion::{DraftBoard, DraftMove, DropTable, Side};

use crate::output;
use crate::session::CompanionSession;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/draft", "Pick/ban board, e.g. /draft map Hard Rock Mine, /draft a Shelly"),
    ("/tiers", "Show the tier list for a map"),
    ("/upgrades", "Upgrade recommendations for the remembered or given tag"),
    ("/tag", "Remember your player tag, e.g. /tag #2PP0GQJ8L"),
    ("/preload", "Cache images (whole catalog if no sources)"),
    ("/peek", "Show what a source currently resolves to"),
    ("/drop", "Open star drops, e.g. /drop 100"),
    ("/sync", "Fetch catalog and tier data from the backend"),
    ("/stats", "Show cache and snapshot statistics"),
    ("/clear-cache", "Release every cached image"),
    ("/remember", "Store a value, e.g. /remember player_tag #2PP"),
    ("/recall", "Show a stored value"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// Largest drop count accepted by `/drop`.
const MAX_REPL_DROPS: usize = 1_000_000;

/// `/draft` subcommands.
const DRAFT_ACTIONS: &[&str] = &["show", "map", "a", "b", "ban", "mode", "suggest", "reset"];

/// Upgrade rows shown by `/upgrades`.
const REPL_TOP_UPGRADES: usize = 10;

/// REPL helper for tab completion of commands, map and brawler names.
#[derive(Default)]
struct CompanionHelper {
    maps: Vec<String>,
    brawlers: Vec<String>,
}

fn complete_names(names: &[String], input: &str, prefix: &str) -> (usize, Vec<Pair>) {
    let start = input.len() - prefix.len();
    let lower = prefix.to_lowercase();
    let matches = names
        .iter()
        .filter(|n| n.to_lowercase().starts_with(&lower))
        .map(|n| Pair {
            display: n.clone(),
            replacement: n.clone(),
        })
        .collect();
    (start, matches)
}

impl Completer for CompanionHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        match cmd {
            "/tiers" => Ok(complete_names(&self.maps, input, args.trim_start())),
            "/draft" => {
                let args = args.trim_start();
                match args.split_once(' ') {
                    None => {
                        let start = input.len() - args.len();
                        let matches = DRAFT_ACTIONS
                            .iter()
                            .filter(|a| a.starts_with(args))
                            .map(|a| Pair {
                                display: a.to_string(),
                                replacement: format!("{a} "),
                            })
                            .collect();
                        Ok((start, matches))
                    }
                    Some(("map", rest)) => Ok(complete_names(&self.maps, input, rest.trim_start())),
                    Some(("a" | "b" | "ban", rest)) => {
                        Ok(complete_names(&self.brawlers, input, rest.trim_start()))
                    }
                    Some(_) => Ok((pos, Vec::new())),
                }
            }
            _ => Ok((pos, Vec::new())),
        }
    }
}

impl Hinter for CompanionHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for CompanionHelper {}
impl Validator for CompanionHelper {}
impl Helper for CompanionHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Run the interactive REPL.
///
/// Blocks the calling thread; async commands run on `handle`, so call this
/// from a blocking task rather than from inside the runtime.
pub fn run(mut session: CompanionSession, handle: Handle) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mdraft-companion v{}\x1b[0m \x1b[90m\u{2014} Draft Simulator Companion\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<CompanionHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(helper_for(&session)));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".draft_companion_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mdraft>\x1b[0m ";
    let mut board = DraftBoard::new();

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
                let args = args.trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "draft" => cmd_draft(args, &mut board, &session, &handle),
                    "tiers" => cmd_tiers(args, &mut session, &handle),
                    "upgrades" => cmd_upgrades(args, &mut session, &handle),
                    "tag" => cmd_tag(args, &mut session),
                    "preload" => cmd_preload(args, &session, &handle),
                    "peek" => cmd_peek(args, &session),
                    "drop" => cmd_drop(args),
                    "sync" => {
                        cmd_sync(&mut session, &handle);
                        rl.set_helper(Some(helper_for(&session)));
                    }
                    "stats" => cmd_stats(&session),
                    "clear-cache" => {
                        let released = session.cache().clear();
                        eprintln!("  Released {released} cached images.");
                    }
                    "remember" => cmd_remember(args, &mut session),
                    "recall" => cmd_recall(args, &session),
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or(std::path::Path::new(".")));
    let _ = rl.save_history(&hist_path);

    session.save()?;
    Ok(())
}

fn helper_for(session: &CompanionSession) -> CompanionHelper {
    let catalog = &session.snapshot().catalog;
    CompanionHelper {
        maps: catalog.maps.iter().map(|m| m.name.clone()).collect(),
        brawlers: catalog.brawlers.iter().map(|b| b.name.clone()).collect(),
    }
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completes commands, map names and brawler names.");
    eprintln!("  Draft: /draft map <map>, /draft a|b <brawler> (again to remove),");
    eprintln!("         /draft ban <brawler>, /draft mode, /draft suggest, /draft reset");
    eprintln!();
}

fn cmd_tiers(args: &str, session: &mut CompanionSession, handle: &Handle) {
    if args.is_empty() {
        eprintln!("  Usage: /tiers <map>");
        return;
    }
    match handle.block_on(session.tier_list(args, false)) {
        Ok(list) => {
            eprintln!();
            eprintln!("  \x1b[1m{args}\x1b[0m");
            eprint!("{}", output::tier_list(&list));
            eprintln!();
        }
        Err(e) => eprintln!("  Cannot build tier list: {e}"),
    }
}

fn cmd_draft(args: &str, board: &mut DraftBoard, session: &CompanionSession, handle: &Handle) {
    let (action, rest) = args.split_once(' ').unwrap_or((args, ""));
    let rest = rest.trim();

    match action {
        "" | "show" => {}
        "map" => match session.resolve_map(rest) {
            Ok(map) => board.set_map(map),
            Err(e) => {
                eprintln!("  {e}");
                return;
            }
        },
        "a" | "b" | "ban" => {
            let brawler = match session.brawler(rest) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("  {e}");
                    return;
                }
            };
            let side = if action == "b" { Side::B } else { Side::A };
            let ban_mode = board.ban_mode();
            if action == "ban" {
                board.set_ban_mode(true);
            }
            let result = board.select(&brawler, side);
            board.set_ban_mode(ban_mode);
            match result {
                Ok(DraftMove::Picked(side)) => eprintln!("  {} joins {side}.", brawler.name),
                Ok(DraftMove::Unpicked(side)) => eprintln!("  {} leaves {side}.", brawler.name),
                Ok(DraftMove::Banned) => eprintln!("  {} banned.", brawler.name),
                Ok(DraftMove::Unbanned) => eprintln!("  {} unbanned.", brawler.name),
                Err(e) => {
                    eprintln!("  {e}");
                    return;
                }
            }
        }
        "mode" => {
            let on = board.toggle_ban_mode();
            eprintln!("  Ban mode {}.", if on { "on" } else { "off" });
        }
        "reset" => {
            board.reset();
            eprintln!("  Board cleared.");
            return;
        }
        "suggest" => {
            let tag = session.player_tag();
            match handle.block_on(session.advise(board, tag.as_ref())) {
                Ok(advice) => eprint!("{}", output::draft_advice(&advice, board.is_complete())),
                Err(e) => eprintln!("  Cannot get suggestions: {e}"),
            }
            return;
        }
        other => {
            eprintln!("  Unknown draft action '{other}'. Try: {}", DRAFT_ACTIONS.join(", "));
            return;
        }
    }
    eprint!("{}", output::draft_board(board));
}

fn cmd_upgrades(args: &str, session: &mut CompanionSession, handle: &Handle) {
    let tag = if args.is_empty() {
        match session.player_tag() {
            Some(tag) => tag,
            None => {
                eprintln!("  Usage: /upgrades <tag> (or remember one with /tag)");
                return;
            }
        }
    } else {
        match session.set_player_tag(args) {
            Ok(tag) => tag,
            Err(e) => {
                eprintln!("  {e}");
                return;
            }
        }
    };
    match handle.block_on(session.upgrades(&tag)) {
        Ok(rows) => {
            eprintln!("  Best upgrades for {tag}:");
            eprint!("{}", output::upgrades(&top_upgrades(&rows, REPL_TOP_UPGRADES)));
        }
        Err(e) => eprintln!("  Cannot load upgrades: {e}"),
    }
}

fn cmd_tag(args: &str, session: &mut CompanionSession) {
    if args.is_empty() {
        match session.player_tag() {
            Some(tag) => eprintln!("  Player tag: {tag}"),
            None => eprintln!("  Usage: /tag <player tag>"),
        }
        return;
    }
    match session.set_player_tag(args) {
        Ok(tag) => eprintln!("  Remembered {tag}."),
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_preload(args: &str, session: &CompanionSession, handle: &Handle) {
    let report = if args.is_empty() {
        handle.block_on(session.preload_roster())
    } else {
        handle.block_on(session.cache().preload_all(args.split_whitespace()))
    };
    eprintln!("{}", output::preload_report(&report));
}

fn cmd_peek(args: &str, session: &CompanionSession) {
    if args.is_empty() {
        eprintln!("  Usage: /peek <source>");
        return;
    }
    let cache = session.cache();
    let resolved = cache.peek(args);
    eprintln!("  {args}");
    eprintln!("    -> {resolved}");
    if let Some(asset) = cache.open(&resolved) {
        eprintln!(
            "    {}x{} {} ({} bytes)",
            asset.width,
            asset.height,
            asset.mime.as_deref().unwrap_or("unknown"),
            asset.len()
        );
    } else {
        eprintln!("    not cached");
    }
}

fn cmd_drop(args: &str) {
    let count = if args.is_empty() {
        1
    } else {
        match args.parse::<usize>() {
            Ok(n) if (1..=MAX_REPL_DROPS).contains(&n) => n,
            _ => {
                eprintln!("  Usage: /drop [1-{MAX_REPL_DROPS}]");
                return;
            }
        }
    };
    match DropTable::standard().simulate(count, &mut thread_rng()) {
        Ok(summary) => eprint!("{}", output::drop_summary(&summary)),
        Err(e) => eprintln!("  Simulation failed: {e}"),
    }
}

fn cmd_sync(session: &mut CompanionSession, handle: &Handle) {
    eprintln!("  Syncing from {} ...", session.api().base_url());
    match handle.block_on(session.sync(&[])) {
        Ok(report) => {
            eprintln!(
                "  {} brawlers, {} maps, tier data for {} maps",
                report.brawlers, report.maps, report.tier_maps
            );
            if !report.failed.is_empty() {
                eprintln!("  Failed: {}", report.failed.join(", "));
            }
        }
        Err(e) => eprintln!("  Sync failed: {e}"),
    }
}

fn cmd_stats(session: &CompanionSession) {
    eprintln!();
    eprintln!("  Snapshot: {}", session.file_path().display());
    eprint!("{}", output::snapshot_summary(session.snapshot()));
    eprintln!("{}", output::cache_stats(&session.cache().stats()));
    eprintln!();
}

fn cmd_remember(args: &str, session: &mut CompanionSession) {
    let Some((key, value)) = args.split_once(' ') else {
        eprintln!("  Usage: /remember <key> <value>");
        return;
    };
    match session.remember(key, value.trim()) {
        Ok(()) => eprintln!("  Remembered {key}."),
        Err(e) => eprintln!("  Cannot remember {key}: {e}"),
    }
}

fn cmd_recall(args: &str, session: &CompanionSession) {
    if args.is_empty() {
        for (key, value) in &session.snapshot().entries {
            eprintln!("  {key:<16} {value}");
        }
        return;
    }
    match session.recall(args) {
        Some(value) => eprintln!("  {args}: {value}"),
        None => eprintln!("  Nothing stored for {args}."),
    }
}

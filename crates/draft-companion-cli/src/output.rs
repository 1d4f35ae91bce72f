//! Plain-text rendering shared by the commands and the REPL.

use std::fmt::Write;

use draft_companion::draft::{Outlook, NO_WIN_RATE_MESSAGE};
use draft_companion::star_drop::reward_image;
use draft_companion::{
    CacheStats, DraftBoard, DropSummary, PreloadReport, ScoreBand, Side, Snapshot, TierList,
    UpgradeCandidate, WinRateBand,
};

use crate::types::DraftAdvice;

/// One line per non-empty tier: label, then members with scores.
pub fn tier_list(list: &TierList) -> String {
    let mut out = String::new();
    if list.is_empty() {
        out.push_str("  (no scored brawlers)\n");
        return out;
    }

    for bucket in list.non_empty() {
        let members: Vec<String> = bucket
            .members
            .iter()
            .map(|m| format!("{} ({:.2})", m.name, m.score))
            .collect();
        let _ = writeln!(out, "  {:<2} {}", bucket.tier.label(), members.join(", "));
    }
    let _ = writeln!(
        out,
        "  mean {:.3}, std dev {:.3}, {} brawlers",
        list.mean,
        list.std_dev,
        list.len()
    );
    out
}

/// Rarity totals, most valuable first, with the reward breakdown.
pub fn drop_summary(summary: &DropSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {} drops", summary.total);
    for (rarity, count) in &summary.by_rarity {
        let _ = writeln!(
            out,
            "  {:<11} {:>7}  {:>6.2}%",
            rarity.name(),
            count,
            summary.rate(*rarity) * 100.0
        );
        if let Some(rewards) = summary.by_reward.get(rarity) {
            let mut rewards: Vec<_> = rewards.iter().collect();
            rewards.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (item, n) in rewards {
                let _ = writeln!(out, "      {item:<28} {n:>7}  {}", reward_image(item));
            }
        }
    }
    out
}

pub fn preload_report(report: &PreloadReport) -> String {
    format!(
        "  Preloaded {} images: {} cached, {} fell back to source",
        report.requested, report.resolved, report.fell_back
    )
}

pub fn cache_stats(stats: &CacheStats) -> String {
    format!(
        "  Cache: {} resolved, {} in flight, {} bytes retained",
        stats.resolved, stats.in_flight, stats.retained_bytes
    )
}

/// Map, both teams and bans, one line each.
pub fn draft_board(board: &DraftBoard) -> String {
    let names = |list: &[draft_companion::Brawler]| {
        if list.is_empty() {
            "-".to_string()
        } else {
            list.iter().map(|b| b.name.as_str()).collect::<Vec<_>>().join(", ")
        }
    };
    let mut out = String::new();
    let _ = writeln!(out, "  Map:    {}", board.map().unwrap_or("(none)"));
    let _ = writeln!(out, "  Team A: {}", names(board.team(Side::A)));
    let _ = writeln!(out, "  Team B: {}", names(board.team(Side::B)));
    let _ = writeln!(
        out,
        "  Bans:   {}{}",
        names(board.bans()),
        if board.ban_mode() { "  [ban mode]" } else { "" }
    );
    out
}

/// Ranked suggestions, then the win-rate verdict if one was predicted.
pub fn draft_advice(advice: &DraftAdvice, board_complete: bool) -> String {
    let mut out = String::new();
    if advice.suggestions.is_empty() {
        out.push_str("  (no suggestions)\n");
    }
    for (rank, pick) in advice.suggestions.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {:<16} {:.4}", rank + 1, pick.name, pick.score);
    }
    if advice.account_filtered {
        out.push_str("  Limited to the account's brawlers.\n");
    }
    if board_complete {
        let _ = writeln!(out, "{}", win_rate(advice.win_rate));
    }
    out
}

/// Predicted win rate with its verdict.
pub fn win_rate(rate: Option<f64>) -> String {
    match rate {
        None => format!("  {NO_WIN_RATE_MESSAGE}"),
        Some(rate) => {
            format!(
                "  Win rate {rate:.1}% ({}): {}",
                Outlook::of(rate).as_str(),
                WinRateBand::of(rate).message()
            )
        }
    }
}

/// Upgrade table: name, score band, power points and coins.
pub fn upgrades(rows: &[UpgradeCandidate]) -> String {
    let mut out = String::new();
    if rows.is_empty() {
        out.push_str("  (no brawlers)\n");
        return out;
    }
    let _ = writeln!(
        out,
        "  {:<16} {:>7} {:<9} {:>8} {:>8}",
        "brawler", "score", "", "pp", "coins"
    );
    for row in rows {
        let score = row
            .score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<16} {:>7} {:<9} {:>8} {:>8}",
            row.name,
            score,
            ScoreBand::of(row.score).as_str(),
            row.total_power_points,
            row.total_coins
        );
    }
    out
}

/// Multi-line summary of a snapshot's contents.
pub fn snapshot_summary(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Brawlers:  {}", snapshot.catalog.brawlers.len());
    let _ = writeln!(out, "  Maps:      {}", snapshot.catalog.maps.len());
    let _ = writeln!(out, "  Tier data: {} maps", snapshot.tier_data.len());
    let _ = writeln!(out, "  Entries:   {}", snapshot.entries.len());
    if let Some(version) = &snapshot.latest_version {
        let _ = writeln!(out, "  Version:   {} ({})", version.version, version.date);
    }
    let saved = chrono::DateTime::from_timestamp(snapshot.saved_at as i64, 0)
        .filter(|_| snapshot.saved_at > 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(out, "  Saved:     {saved}");
    out
}

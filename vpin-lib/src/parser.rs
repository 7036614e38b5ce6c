//! Turns decoder text into a structured [`Highscore`].
//!
//! The decoder prints a small ASCII score table surrounded by banner lines
//! ("HIGHEST SCORES", dates, blank lines). A score row is either
//! `"<rank>) <initials> <points>"` or `"<initials> <points>"`; points may
//! use commas, periods or spaces as grouping separators. Everything else
//! is discarded. Ranks are renumbered 1..N in the output regardless of
//! what the decoder printed.

use std::path::Path;

use chrono::Utc;
use vpin_core::{GameId, Highscore, Score};

/// Parse decoder output into a [`Highscore`], or `None` when no score row
/// was found. The verbatim input is preserved in the `raw` field.
pub fn parse(raw: &str, game_id: GameId, source_path: &Path) -> Option<Highscore> {
    let scores = parse_scores(raw);
    if scores.is_empty() {
        return None;
    }
    Some(Highscore {
        game_id,
        scores,
        raw: raw.to_string(),
        source_path: source_path.to_path_buf(),
        loaded_at: Utc::now(),
    })
}

/// Extract score rows, renumbered 1..N.
pub fn parse_scores(raw: &str) -> Vec<Score> {
    raw.lines()
        .filter_map(parse_score_row)
        .enumerate()
        .map(|(i, (initials, points))| Score::new(i as u32 + 1, initials, points))
        .collect()
}

fn parse_score_row(line: &str) -> Option<(String, u64)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }

    // Explicit rank prefix is optional; rank is implicit by order anyway.
    let rest = if tokens.len() >= 3 && is_rank_token(tokens[0]) {
        &tokens[1..]
    } else {
        &tokens[..]
    };

    let initials = rest[0];
    if !is_initials(initials) {
        return None;
    }
    let points = normalize_points(&rest[1..])?;
    Some((initials.to_string(), points))
}

/// `"1)"`, `"12)"`.
fn is_rank_token(token: &str) -> bool {
    token
        .strip_suffix(')')
        .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// 1–8 printable, non-whitespace characters.
fn is_initials(token: &str) -> bool {
    (1..=8).contains(&token.chars().count()) && token.chars().all(|c| c.is_ascii_graphic())
}

/// Points may be split across tokens by space grouping ("1 234 567") and
/// may carry comma/period separators. Every token must consist of digits
/// and separators only, otherwise the line is a banner, not a score.
fn normalize_points(tokens: &[&str]) -> Option<u64> {
    if tokens.is_empty() {
        return None;
    }
    let mut digits = String::new();
    for token in tokens {
        if !token.chars().all(|c| c.is_ascii_digit() || matches!(c, ',' | '.')) {
            return None;
        }
        digits.extend(token.chars().filter(|c| c.is_ascii_digit()));
    }
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

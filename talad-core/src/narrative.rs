//! Fallback narrative generator.
//!
//! Maps a compact sector-highlights string (e.g. `+68 +61 +64`) to a
//! displayable sentence without ever failing: the first signed integer token
//! keys a static phrase table by the last digit of its absolute value, one
//! candidate is chosen at random, and a fixed neutral sentence covers every
//! input the table cannot. Used when the AI narrative backend is disabled or
//! returns nothing.
//!
//! Callers needing deterministic output inject the RNG; the convenience
//! wrapper uses the thread-local RNG.

use rand::Rng;
use regex::Regex;

const NEUTRAL_FALLBACK: &str =
    "The market traded quietly with no sector standing out this session.";

/// Candidate sentences per key (last digit of the first highlighted move).
/// Loaded once at process start as static data; read-only thereafter.
fn phrase_candidates(key: u32) -> &'static [&'static str] {
    match key {
        0 => &[
            "The board opened flat as buyers and sellers held their ground.",
            "Early trade was balanced, with sector moves cancelling each other out.",
        ],
        1 => &[
            "A thin early move hinted at a cautious session ahead.",
            "The tape drifted with only marginal sector rotation.",
        ],
        2 => &[
            "Modest sector gains set a slow but steady tone.",
            "Light buying in the leaders kept the board mildly positive.",
        ],
        3 => &[
            "Selective buying lifted a handful of sectors off the open.",
            "The session opened with measured interest in the big caps.",
        ],
        4 => &[
            "Rotation into the heavyweight sectors gave the index an early lean.",
            "A firm undertone emerged as the main sectors found sponsorship.",
        ],
        5 => &[
            "Half the board moved in step, suggesting broad conviction.",
            "Sector breadth improved steadily through the opening prints.",
        ],
        6 => &[
            "Momentum names pulled the index along in active early trade.",
            "The leaders extended their run, dragging the laggards with them.",
        ],
        7 => &[
            "A brisk open put the bulls in charge of the morning tape.",
            "Strong sector follow-through kept the offer side thin.",
        ],
        8 => &[
            "Heavy sector moves marked one of the livelier opens this month.",
            "The board lit up as the major sectors swung hard in one direction.",
            "Aggressive positioning in the index heavyweights set a decisive tone.",
        ],
        9 => &[
            "An outsized swing in the leaders dominated the session's open.",
            "The tape ran hot from the first print, with breadth to match.",
        ],
        _ => &[],
    }
}

/// Build a sentence from the highlights string using an injected RNG.
/// Always returns displayable text.
pub fn highlight_narrative_with<R: Rng>(highlights: &str, rng: &mut R) -> String {
    let key = match first_move_key(highlights) {
        Some(key) => key,
        None => return NEUTRAL_FALLBACK.to_string(),
    };

    let candidates = phrase_candidates(key);
    if candidates.is_empty() {
        return NEUTRAL_FALLBACK.to_string();
    }
    candidates[rng.gen_range(0..candidates.len())].to_string()
}

/// Convenience wrapper over the thread-local RNG.
pub fn highlight_narrative(highlights: &str) -> String {
    highlight_narrative_with(highlights, &mut rand::thread_rng())
}

/// Last digit of the absolute value of the first signed integer token.
fn first_move_key(highlights: &str) -> Option<u32> {
    let token = Regex::new(r"[+-]?\d+").ok()?;
    let m = token.find(highlights)?;
    m.as_str()
        .trim_start_matches(['+', '-'])
        .chars()
        .last()
        .and_then(|c| c.to_digit(10))
}

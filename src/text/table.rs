//! Emoji reference table
//!
//! Built once from the `emojis` crate (fully-qualified sequences, every
//! skin-tone variant) plus the standalone components (skin tones, hair).
//! Also answers the cheap "does this batch contain any emoji" question.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::constants::{CUSTOM_EMOJI_MIN_LEN, CUSTOM_EMOJI_PATTERN};

/// Skin tone modifiers U+1F3FB..U+1F3FF
const SKIN_TONES: std::ops::RangeInclusive<u32> = 0x1F3FB..=0x1F3FF;

/// Hair components U+1F9B0..U+1F9B3
const HAIR_COMPONENTS: std::ops::RangeInclusive<u32> = 0x1F9B0..=0x1F9B3;

static TABLE: OnceLock<EmojiTable> = OnceLock::new();
static CUSTOM_MARKUP: OnceLock<Regex> = OnceLock::new();

/// Every recognized emoji sequence, indexed for left-to-right matching
pub struct EmojiTable {
    /// All sequences (single and multi codepoint)
    sequences: HashSet<&'static str>,
    /// Owned storage for components not provided by `emojis`
    components: HashSet<String>,
    /// Longest sequence length in chars
    max_chars: usize,
    /// Codepoints that are an emoji on their own
    solo: HashSet<char>,
    /// First codepoint -> second codepoints, for sequences whose
    /// first codepoint is not an emoji by itself (keycaps, flags, "☺️")
    pairs: HashMap<char, HashSet<char>>,
}

impl EmojiTable {
    /// Shared table (built on first use)
    pub fn get() -> &'static Self {
        TABLE.get_or_init(Self::build)
    }

    fn build() -> Self {
        let mut sequences: HashSet<&'static str> = HashSet::new();
        for emoji in emojis::iter() {
            sequences.insert(emoji.as_str());
            if let Some(tones) = emoji.skin_tones() {
                for toned in tones {
                    sequences.insert(toned.as_str());
                }
            }
        }

        let components: HashSet<String> = SKIN_TONES
            .chain(HAIR_COMPONENTS)
            .filter_map(char::from_u32)
            .map(String::from)
            .collect();

        let all = || {
            sequences
                .iter()
                .copied()
                .chain(components.iter().map(String::as_str))
        };

        let max_chars = all().map(|s| s.chars().count()).max().unwrap_or(1);

        let solo: HashSet<char> = all()
            .filter_map(|s| {
                let mut chars = s.chars();
                let first = chars.next()?;
                chars.next().is_none().then_some(first)
            })
            .collect();

        let mut pairs: HashMap<char, HashSet<char>> = HashMap::new();
        for seq in all() {
            let mut chars = seq.chars();
            if let (Some(first), Some(second)) = (chars.next(), chars.next()) {
                if !solo.contains(&first) {
                    pairs.entry(first).or_default().insert(second);
                }
            }
        }

        debug!(
            "EmojiTable: {} sequences, {} solo starts, {} sequence starts, max {} chars",
            sequences.len() + components.len(),
            solo.len(),
            pairs.len(),
            max_chars
        );

        Self {
            sequences,
            components,
            max_chars,
            solo,
            pairs,
        }
    }

    /// Whether `s` is exactly one known emoji sequence
    pub fn is_emoji(&self, s: &str) -> bool {
        self.sequences.contains(s) || self.components.contains(s)
    }

    /// Whether some emoji sequence could begin with `c` followed by `next`
    ///
    /// Exact on the first two codepoints, so it never misses a sequence;
    /// a `true` only means the full matcher has to look.
    pub fn starts_emoji(&self, c: char, next: Option<char>) -> bool {
        if self.solo.contains(&c) {
            return true;
        }
        match (self.pairs.get(&c), next) {
            (Some(seconds), Some(n)) => seconds.contains(&n),
            _ => false,
        }
    }

    /// Longest emoji sequence at the start of `rest`
    pub fn longest_match<'a>(&self, rest: &'a str) -> Option<&'a str> {
        let mut chars = rest.chars();
        let first = chars.next()?;
        if !self.starts_emoji(first, chars.next()) {
            return None;
        }

        let ends: Vec<usize> = rest
            .char_indices()
            .take(self.max_chars)
            .map(|(i, c)| i + c.len_utf8())
            .collect();

        ends.into_iter()
            .rev()
            .map(|end| &rest[..end])
            .find(|candidate| self.is_emoji(candidate))
    }

    /// Number of known sequences
    pub fn len(&self) -> usize {
        self.sequences.len() + self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every fully-qualified emoji (default and toned variants)
    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sequences.iter().copied()
    }
}

/// Anchored custom emoji markup matcher
pub(crate) fn custom_markup() -> &'static Regex {
    CUSTOM_MARKUP.get_or_init(|| {
        Regex::new(&format!("^{}", CUSTOM_EMOJI_PATTERN)).expect("custom emoji pattern is valid")
    })
}

/// Fast pre-check over a batch of lines
///
/// Returns false only when no line can contain an emoji token, so callers
/// may skip tokenization entirely and draw plain text.
pub fn contains_emoji<S: AsRef<str>>(lines: &[S], allow_custom: bool) -> bool {
    let table = EmojiTable::get();

    let unicode = lines.iter().any(|line| {
        let mut chars = line.as_ref().chars().peekable();
        while let Some(c) = chars.next() {
            if table.starts_emoji(c, chars.peek().copied()) {
                return true;
            }
        }
        false
    });
    if unicode {
        return true;
    }

    allow_custom
        && lines.iter().any(|line| {
            let line = line.as_ref();
            line.len() >= CUSTOM_EMOJI_MIN_LEN
                && line
                    .match_indices('<')
                    .any(|(i, _)| custom_markup().is_match(&line[i..]))
        })
}

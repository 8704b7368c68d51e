//! Line tokenizer
//!
//! Scans left to right. At each position the custom emoji markup is tried
//! first (when enabled), then the longest known Unicode emoji sequence.
//! Everything else accumulates into a pending text run.

use super::table::{custom_markup, EmojiTable};
use super::{Document, Line, Token};

/// Tokenize one line
///
/// An empty line yields no tokens.
pub fn tokenize(line: &str, allow_custom: bool) -> Line<'_> {
    let table = EmojiTable::get();
    let mut tokens = Vec::new();
    let mut text_start = 0usize;
    let mut pos = 0usize;

    while pos < line.len() {
        let rest = &line[pos..];

        let custom = if allow_custom && rest.starts_with('<') {
            match_custom(rest)
        } else {
            None
        };
        let matched = custom.or_else(|| table.longest_match(rest).map(Token::emoji));

        match matched {
            Some(token) => {
                if text_start < pos {
                    tokens.push(Token::text(&line[text_start..pos]));
                }
                pos += token.raw.len();
                text_start = pos;
                tokens.push(token);
            }
            None => {
                // Advance one char; `rest` is non-empty here
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if text_start < line.len() {
        tokens.push(Token::text(&line[text_start..]));
    }

    tokens
}

/// Custom emoji markup anchored at the start of `rest`
fn match_custom(rest: &str) -> Option<Token<'_>> {
    let caps = custom_markup().captures(rest)?;
    let whole = caps.get(0)?;
    let id = caps.get(3)?;
    Some(Token::custom(id.as_str(), &rest[..whole.end()]))
}

/// Tokenize every line of a batch
pub fn tokenize_lines<S: AsRef<str>>(lines: &[S], allow_custom: bool) -> Document<'_> {
    lines
        .iter()
        .map(|line| tokenize(line.as_ref(), allow_custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::{contains_emoji, TokenKind};
    use super::*;
    use proptest::prelude::*;

    fn kinds<'a>(tokens: &[Token<'a>]) -> Vec<(TokenKind, &'a str)> {
        tokens.iter().map(|t| (t.kind, t.content)).collect()
    }

    #[test]
    fn test_text_emoji_text() {
        let tokens = tokenize("Hello👋Hello", false);
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenKind::Text, "Hello"),
                (TokenKind::Emoji, "👋"),
                (TokenKind::Text, "Hello"),
            ]
        );
    }

    #[test]
    fn test_empty_line() {
        assert!(tokenize("", true).is_empty());
        assert!(tokenize("", false).is_empty());
    }

    #[test]
    fn test_skin_tone_sequence_not_split() {
        let tokens = tokenize("👍🏿", false);
        assert_eq!(kinds(&tokens), vec![(TokenKind::Emoji, "👍🏿")]);
    }

    #[test]
    fn test_modifier_sequences_separated_by_text() {
        let tokens = tokenize("👍🏻|👍🏼|👍🏽|👍🏾|👍🏿", false);
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenKind::Emoji, "👍🏻"),
                (TokenKind::Text, "|"),
                (TokenKind::Emoji, "👍🏼"),
                (TokenKind::Text, "|"),
                (TokenKind::Emoji, "👍🏽"),
                (TokenKind::Text, "|"),
                (TokenKind::Emoji, "👍🏾"),
                (TokenKind::Text, "|"),
                (TokenKind::Emoji, "👍🏿"),
            ]
        );
    }

    #[test]
    fn test_adjacent_emoji() {
        let tokens = tokenize("👍👍", false);
        assert_eq!(
            kinds(&tokens),
            vec![(TokenKind::Emoji, "👍"), (TokenKind::Emoji, "👍")]
        );
    }

    #[test]
    fn test_zwj_sequence_is_one_token() {
        let family = "👨\u{200D}👩\u{200D}👧\u{200D}👦";
        let line = format!("a{}b", family);
        let tokens = tokenize(&line, false);
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenKind::Text, "a"),
                (TokenKind::Emoji, family),
                (TokenKind::Text, "b"),
            ]
        );
    }

    #[test]
    fn test_flag_sequence() {
        let tokens = tokenize("go 🇯🇵!", false);
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenKind::Text, "go "),
                (TokenKind::Emoji, "🇯🇵"),
                (TokenKind::Text, "!"),
            ]
        );
    }

    #[test]
    fn test_custom_emoji_extraction() {
        let tokens = tokenize("A<:rooThink:596576798351949847>B", true);
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenKind::Text, "A"),
                (TokenKind::CustomEmoji, "596576798351949847"),
                (TokenKind::Text, "B"),
            ]
        );
        assert_eq!(tokens[1].raw, "<:rooThink:596576798351949847>");
        assert_eq!(tokens[1].custom_name(), Some("rooThink"));
    }

    #[test]
    fn test_custom_emoji_disabled_is_text() {
        let line = "A<:rooThink:596576798351949847>B";
        let tokens = tokenize(line, false);
        assert_eq!(kinds(&tokens), vec![(TokenKind::Text, line)]);
    }

    #[test]
    fn test_custom_emoji_preserves_order_with_unicode() {
        let tokens = tokenize("👍🏻|<a:blob:596576798351949847>|😎", true);
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenKind::Emoji, "👍🏻"),
                (TokenKind::Text, "|"),
                (TokenKind::CustomEmoji, "596576798351949847"),
                (TokenKind::Text, "|"),
                (TokenKind::Emoji, "😎"),
            ]
        );
        assert!(tokens[2].is_animated());
    }

    #[test]
    fn test_malformed_custom_emoji_is_text() {
        for line in [
            "<:short:1234567890>",
            "<:bad-name:596576798351949847>",
            "<:rooThink:59657679835194984x>",
            "<:rooThink:12345678901234567890123>",
            "<b:rooThink:596576798351949847>",
        ] {
            let tokens = tokenize(line, true);
            assert_eq!(kinds(&tokens), vec![(TokenKind::Text, line)], "{}", line);
        }
    }

    #[test]
    fn test_tokenize_lines() {
        let doc = tokenize_lines(&["one 🚀", "", "two"], false);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc[0].len(), 2);
        assert!(doc[1].is_empty());
        assert_eq!(kinds(&doc[2]), vec![(TokenKind::Text, "two")]);
    }

    proptest! {
        #[test]
        fn prop_raw_round_trip(line in "\\PC{0,40}", allow_custom in any::<bool>()) {
            let tokens = tokenize(&line, allow_custom);
            let rebuilt: String = tokens.iter().map(|t| t.raw).collect();
            prop_assert_eq!(rebuilt, line);
        }

        #[test]
        fn prop_content_round_trip_without_custom(line in "\\PC{0,40}") {
            let tokens = tokenize(&line, false);
            let rebuilt: String = tokens.iter().map(|t| t.content).collect();
            prop_assert_eq!(rebuilt, line);
        }

        #[test]
        fn prop_no_empty_tokens(line in "\\PC{0,40}") {
            for token in tokenize(&line, true) {
                prop_assert!(!token.content.is_empty());
            }
        }

        #[test]
        fn prop_fast_path_agrees_on_plain_text(line in "[a-zA-Z0-9 .,!?#*<>:_-]{0,60}") {
            let tokens = tokenize(&line, false);
            prop_assert!(!contains_emoji(&[line.as_str()], false));
            prop_assert!(tokens.iter().all(|t| t.kind == TokenKind::Text));
            prop_assert!(tokens.len() <= 1);
        }

        #[test]
        fn prop_fast_path_never_misses(line in "\\PC{0,40}") {
            let has_token = tokenize(&line, false).iter().any(|t| t.is_emoji());
            if has_token {
                prop_assert!(contains_emoji(&[line.as_str()], false));
            }
        }
    }
}

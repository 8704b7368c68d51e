//! Text segmentation
//!
//! Splits lines into text runs and emoji tokens:
//! - Unicode emoji (longest known sequence wins, so modifier/ZWJ sequences stay whole)
//! - Custom emoji markup `<a?:name:id>` (optional)
//!
//! Tokens borrow from the input line; nothing here allocates per character.

pub mod table;
pub mod tokenizer;

pub use table::{contains_emoji, EmojiTable};
pub use tokenizer::{tokenize, tokenize_lines};

/// Token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Maximal run of non-emoji characters
    Text,
    /// Unicode emoji sequence (one or more codepoints)
    Emoji,
    /// Custom emoji reference, content is the numeric id
    CustomEmoji,
}

/// One classified unit of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Text run, emoji sequence, or custom emoji id
    pub content: &'a str,
    /// Exact source span (equals `content` except for custom emoji markup)
    pub raw: &'a str,
}

impl<'a> Token<'a> {
    pub fn text(content: &'a str) -> Self {
        Self {
            kind: TokenKind::Text,
            content,
            raw: content,
        }
    }

    pub fn emoji(content: &'a str) -> Self {
        Self {
            kind: TokenKind::Emoji,
            content,
            raw: content,
        }
    }

    pub fn custom(id: &'a str, raw: &'a str) -> Self {
        Self {
            kind: TokenKind::CustomEmoji,
            content: id,
            raw,
        }
    }

    /// True for both emoji kinds
    pub fn is_emoji(&self) -> bool {
        !matches!(self.kind, TokenKind::Text)
    }

    /// Display name from custom emoji markup (`rooThink` in `<:rooThink:123...>`)
    pub fn custom_name(&self) -> Option<&'a str> {
        if self.kind != TokenKind::CustomEmoji {
            return None;
        }
        self.raw.split(':').nth(1)
    }

    /// Animated custom emoji (`<a:name:id>`)
    pub fn is_animated(&self) -> bool {
        self.kind == TokenKind::CustomEmoji && self.raw.starts_with("<a:")
    }
}

/// Tokens of one input line, in rendering order (left to right)
pub type Line<'a> = Vec<Token<'a>>;

/// Lines of one render call, in rendering order (top to bottom)
pub type Document<'a> = Vec<Line<'a>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_metadata() {
        let token = Token::custom("596576798351949847", "<a:party_blob:596576798351949847>");
        assert_eq!(token.custom_name(), Some("party_blob"));
        assert!(token.is_animated());
        assert!(token.is_emoji());

        let plain = Token::text("hello");
        assert_eq!(plain.custom_name(), None);
        assert!(!plain.is_animated());
    }
}

//! Token stream with byte offsets.
//!
//! `sqlparser`'s tokenizer reports line/column spans; the statement builder
//! works in byte offsets over the stripped SQL text. This module converts
//! between the two and drops whitespace so token arithmetic counts only
//! significant tokens.

use crate::error::LineageError;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer};

/// A significant token with half-open `[start, end)` byte offsets.
#[derive(Debug, Clone)]
pub(crate) struct SourceToken {
    pub(crate) token: Token,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl SourceToken {
    pub(crate) fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.token, Token::Word(word) if word.keyword == keyword)
    }

    /// Whether this token is an identifier-shaped word (any word token;
    /// aliases frequently collide with non-reserved keywords).
    pub(crate) fn is_word(&self) -> bool {
        matches!(&self.token, Token::Word(_))
    }

    /// The word's value, if this is a word token.
    pub(crate) fn word_value(&self) -> Option<&str> {
        match &self.token {
            Token::Word(word) => Some(&word.value),
            _ => None,
        }
    }
}

/// All significant tokens of one SQL text, in source order.
#[derive(Debug)]
pub(crate) struct TokenList {
    tokens: Vec<SourceToken>,
}

impl TokenList {
    /// Tokenizes `sql` (already comment-stripped) with the PostgreSQL
    /// dialect, keeping only non-whitespace tokens.
    pub(crate) fn tokenize(sql: &str) -> Result<Self, LineageError> {
        let dialect = PostgreSqlDialect {};
        let mut tokenizer = Tokenizer::new(&dialect, sql);
        let raw = tokenizer.tokenize_with_location()?;

        let mut tokens = Vec::with_capacity(raw.len());
        for token in raw {
            if matches!(token.token, Token::Whitespace(_) | Token::EOF) {
                continue;
            }
            let (start, end) = token_byte_offsets(sql, &token)?;
            tokens.push(SourceToken {
                token: token.token,
                start,
                end,
            });
        }

        Ok(TokenList { tokens })
    }

    pub(crate) fn as_slice(&self) -> &[SourceToken] {
        &self.tokens
    }

    /// The contiguous tokens lying fully inside the half-open byte range
    /// `[start, end)`.
    pub(crate) fn real_slice(&self, start: usize, end: usize) -> &[SourceToken] {
        let begin = self
            .tokens
            .iter()
            .position(|token| token.start >= start)
            .unwrap_or(self.tokens.len());
        let count = self.tokens[begin..]
            .iter()
            .take_while(|token| token.end <= end)
            .count();
        &self.tokens[begin..begin + count]
    }
}

fn token_byte_offsets(sql: &str, token: &TokenWithSpan) -> Result<(usize, usize), LineageError> {
    let start = location_offset(sql, token.span.start.line, token.span.start.column)?;
    let end = location_offset(sql, token.span.end.line, token.span.end.column)?;
    Ok((start, end))
}

/// Maps a 1-based line/column location to a byte offset.
pub(crate) fn location_offset(sql: &str, line: u64, column: u64) -> Result<usize, LineageError> {
    line_col_to_offset(sql, line as usize, column as usize)
        .ok_or(LineageError::InvalidLocation { line, column })
}

fn line_col_to_offset(sql: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 || column == 0 {
        return None;
    }

    let mut current_line = 1usize;
    let mut current_col = 1usize;

    for (offset, ch) in sql.char_indices() {
        if current_line == line && current_col == column {
            return Some(offset);
        }

        if ch == '\n' {
            current_line += 1;
            current_col = 1;
        } else {
            current_col += 1;
        }
    }

    if current_line == line && current_col == column {
        return Some(sql.len());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(sql: &str) -> TokenList {
        TokenList::tokenize(sql).expect("tokenize")
    }

    #[test]
    fn offsets_are_byte_accurate() {
        let sql = "SELECT a\nFROM t";
        let list = tokens(sql);
        let slice = list.as_slice();

        assert_eq!(&sql[slice[0].start..slice[0].end], "SELECT");
        assert_eq!(&sql[slice[1].start..slice[1].end], "a");
        assert_eq!(&sql[slice[2].start..slice[2].end], "FROM");
        assert_eq!(&sql[slice[3].start..slice[3].end], "t");
    }

    #[test]
    fn whitespace_is_dropped() {
        let sql = "SELECT   a ,\n  b FROM t";
        let list = tokens(sql);
        let rendered: Vec<String> = list
            .as_slice()
            .iter()
            .map(|token| token.token.to_string())
            .collect();
        assert_eq!(rendered, ["SELECT", "a", ",", "b", "FROM", "t"]);
    }

    #[test]
    fn real_slice_is_half_open() {
        let sql = "SELECT a, b FROM t";
        let list = tokens(sql);

        let a = list.as_slice()[1].clone();
        let comma = list.as_slice()[2].clone();

        let slice = list.real_slice(a.start, comma.end);
        assert_eq!(slice.len(), 2);

        let slice = list.real_slice(a.start, comma.end - 1);
        assert_eq!(slice.len(), 1);
        assert_eq!(&sql[slice[0].start..slice[0].end], "a");
    }

    #[test]
    fn keyword_classification() {
        let sql = "SELECT a AS b FROM t";
        let list = tokens(sql);
        let slice = list.as_slice();
        assert!(slice[0].is_keyword(Keyword::SELECT));
        assert!(slice[2].is_keyword(Keyword::AS));
        assert!(slice[4].is_keyword(Keyword::FROM));
        assert!(slice[3].is_word());
        assert_eq!(slice[3].word_value(), Some("b"));
    }

    #[test]
    fn multibyte_text_keeps_byte_offsets() {
        let sql = "SELECT 'héllo' AS c FROM t";
        let list = tokens(sql);
        let literal = &list.as_slice()[1];
        assert_eq!(&sql[literal.start..literal.end], "'héllo'");
    }
}

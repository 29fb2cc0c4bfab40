//! Formula templates.
//!
//! A formula is the SQL substring of one projection expression with every
//! column reference replaced by a positional `{i}` placeholder. Templates
//! are extracted once by the statement builder and later re-filled with
//! upstream formulas during field resolution. Substitution is a hand-rolled
//! single-pass scanner: SQL text is full of braces and `format!`-style
//! machinery must not touch it.

use crate::error::LineageError;
use crate::parser::tokens::SourceToken;
use crate::parser::visitor::ColumnRefNode;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

/// Builds the formula template for one projection entry.
///
/// `tokens` is the entry's token slice (alias tail still attached), `refs`
/// are its column references in source order with byte locations filled in.
pub(crate) fn extract(
    sql: &str,
    tokens: &[SourceToken],
    refs: &[ColumnRefNode],
    alias: Option<&str>,
) -> Result<String, LineageError> {
    let tokens = trim_alias_tail(tokens, alias);

    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return Err(LineageError::MalformedProjection);
    };
    let bounds = (first.start, last.end);

    let mut out = String::with_capacity(bounds.1 - bounds.0);
    let mut cursor = bounds.0;

    for (index, column_ref) in refs.iter().enumerate() {
        let location = column_ref
            .location
            .ok_or(LineageError::MalformedProjection)?;
        let position = tokens
            .iter()
            .position(|token| token.start == location)
            .ok_or(LineageError::TokenNotFound(location))?;

        // components are laid out IDENT . IDENT . ... so the reference ends
        // 2n - 1 tokens along, counting the first.
        let last_token = tokens
            .get(position + 2 * column_ref.components.len() - 2)
            .ok_or(LineageError::TokenNotFound(location))?;

        out.push_str(&sql[cursor..location]);
        out.push('{');
        out.push_str(&index.to_string());
        out.push('}');
        cursor = last_token.end;
    }

    out.push_str(&sql[cursor..bounds.1]);
    Ok(out)
}

/// Drops the tokens that belong to the projection separator or the alias
/// rather than the expression: a trailing comma or semicolon, unbalanced
/// closing parentheses (left over from a parenthesized FROM-less statement
/// body), an `AS <ident>` pair, or a bare trailing identifier equal to the
/// parsed alias (the implicit-alias form).
fn trim_alias_tail<'a>(mut tokens: &'a [SourceToken], alias: Option<&str>) -> &'a [SourceToken] {
    loop {
        let Some(last) = tokens.last() else {
            return tokens;
        };
        match last.token {
            Token::Comma | Token::SemiColon => tokens = &tokens[..tokens.len() - 1],
            Token::RParen if paren_balance(tokens) < 0 => tokens = &tokens[..tokens.len() - 1],
            _ => break,
        }
    }

    if tokens.len() >= 2
        && tokens[tokens.len() - 2].is_keyword(Keyword::AS)
        && tokens[tokens.len() - 1].is_word()
    {
        return &tokens[..tokens.len() - 2];
    }

    if let (Some(alias), Some(last)) = (alias, tokens.last()) {
        if last
            .word_value()
            .is_some_and(|value| value.eq_ignore_ascii_case(alias))
        {
            return &tokens[..tokens.len() - 1];
        }
    }

    tokens
}

fn paren_balance(tokens: &[SourceToken]) -> i64 {
    tokens
        .iter()
        .map(|token| match token.token {
            Token::LParen => 1,
            Token::RParen => -1,
            _ => 0,
        })
        .sum()
}

/// Replaces `{N}` placeholders with the matching argument.
///
/// Only `{` + digits + `}` groups whose value indexes `args` are replaced;
/// any other brace text passes through verbatim.
pub(crate) fn substitute(template: &str, args: &[String]) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(close) = template[i + 1..].find('}') {
                let digits = &template[i + 1..i + 1 + close];
                if !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit()) {
                    if let Some(arg) = digits.parse::<usize>().ok().and_then(|n| args.get(n)) {
                        out.push_str(arg);
                        i += close + 2;
                        continue;
                    }
                }
            }
        }

        let ch = template[i..]
            .chars()
            .next()
            .expect("index points at a char boundary");
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

//! Comment stripping.
//!
//! Comments are spliced out of the SQL text before parsing so that every
//! byte offset used later (AST locations, token spans, formula bounds)
//! refers to one stable text: the stripped SQL. Block comments are replaced
//! by a single space so adjacent tokens stay separated; line comments are
//! dropped up to their terminating newline.

/// Removes `--` line comments and nested `/* */` block comments.
///
/// Quoted regions are respected: single-quoted strings (with `''`
/// doubling), double-quoted identifiers (with `""` doubling), and
/// dollar-quoted strings all pass through untouched. PostgreSQL has no `#`
/// comments, so `#` stays literal.
pub(crate) fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut i = 0usize;
    let len = sql.len();

    while i < len {
        let rest = &sql[i..];

        if rest.starts_with("--") {
            i += skip_line_comment(rest);
            continue;
        }

        if rest.starts_with("/*") {
            i += skip_block_comment(rest);
            out.push(' ');
            continue;
        }

        let (ch, advance) = next_char(sql, i);
        match ch {
            '\'' => i += copy_quoted(sql, i, '\'', &mut out),
            '"' => i += copy_quoted(sql, i, '"', &mut out),
            '$' => {
                if let Some(delimiter) = dollar_delimiter(rest) {
                    i += copy_dollar_quoted(rest, &delimiter, &mut out);
                } else {
                    out.push(ch);
                    i += advance;
                }
            }
            _ => {
                out.push(ch);
                i += advance;
            }
        }
    }

    out
}

/// Length of a `--` comment, excluding the terminating newline.
fn skip_line_comment(rest: &str) -> usize {
    match rest.find('\n') {
        Some(newline) => newline,
        None => rest.len(),
    }
}

/// Length of a `/* */` comment, honoring PostgreSQL nesting.
fn skip_block_comment(rest: &str) -> usize {
    let mut depth = 0usize;
    let mut i = 0usize;

    while i < rest.len() {
        if rest[i..].starts_with("/*") {
            depth += 1;
            i += 2;
        } else if rest[i..].starts_with("*/") {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            let (_, advance) = next_char(rest, i);
            i += advance;
        }
    }

    // Unterminated comment: the parser will reject the remainder anyway.
    rest.len()
}

/// Copies a quoted region (including both delimiters), honoring doubled
/// quote escapes. Returns the number of bytes consumed.
fn copy_quoted(sql: &str, start: usize, quote: char, out: &mut String) -> usize {
    let mut i = start + quote.len_utf8();
    out.push(quote);

    while i < sql.len() {
        let (ch, advance) = next_char(sql, i);
        out.push(ch);
        i += advance;

        if ch == quote {
            if sql[i..].starts_with(quote) {
                out.push(quote);
                i += quote.len_utf8();
            } else {
                break;
            }
        }
    }

    i - start
}

/// Detects a `$tag$` opener at the start of `rest`.
fn dollar_delimiter(rest: &str) -> Option<String> {
    for (offset, ch) in rest[1..].char_indices() {
        if ch == '$' {
            return Some(rest[..1 + offset + ch.len_utf8()].to_string());
        }
        if !(ch == '_' || ch.is_ascii_alphanumeric()) {
            return None;
        }
    }
    None
}

/// Copies a dollar-quoted region (including both delimiters).
fn copy_dollar_quoted(rest: &str, delimiter: &str, out: &mut String) -> usize {
    let body_start = delimiter.len();
    let end = match rest[body_start..].find(delimiter) {
        Some(found) => body_start + found + delimiter.len(),
        None => rest.len(),
    };
    out.push_str(&rest[..end]);
    end
}

fn next_char(sql: &str, index: usize) -> (char, usize) {
    let ch = sql[index..]
        .chars()
        .next()
        .expect("index points at a char boundary");
    (ch, ch.len_utf8())
}

//! Best-effort parsing of schema DDL text: column definitions from
//! CREATE TABLE, indexed columns from CREATE INDEX. Only the pieces the
//! catalog consumes are extracted; everything else in the statement is
//! tolerated and ignored.

use litescan_error::{Result, ScanError};

/// One table column in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
    /// Declared exactly `INTEGER PRIMARY KEY`: the rowid alias. A NULL
    /// stored in this column materializes as the cell's rowid.
    pub is_integer_primary_key: bool,
}

/// The table and column list of a CREATE INDEX statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub table: String,
    pub columns: Vec<String>,
}

const CONSTRAINT_STARTERS: &[&str] = &["PRIMARY", "UNIQUE", "CHECK", "FOREIGN", "CONSTRAINT"];
const TYPE_TERMINATORS: &[&str] = &[
    "PRIMARY", "NOT", "NULL", "UNIQUE", "DEFAULT", "CHECK", "COLLATE", "REFERENCES", "GENERATED",
    "AS",
];

/// Parse the ordered column list out of a CREATE TABLE statement.
pub fn parse_create_table(name: &str, sql: &str) -> Result<Vec<ColumnDef>> {
    let body = paren_body(sql).ok_or_else(|| ScanError::SchemaUnparseable {
        name: name.to_owned(),
        detail: "CREATE TABLE without a column list".to_owned(),
    })?;

    let mut columns = Vec::new();
    for piece in split_top_level(body) {
        let words = split_words(piece);
        if words.is_empty() {
            continue;
        }
        // Table-level constraints are not columns.
        if !words[0].quoted
            && CONSTRAINT_STARTERS
                .iter()
                .any(|kw| words[0].text.eq_ignore_ascii_case(kw))
        {
            continue;
        }

        let column_name = words[0].text.clone();
        let mut type_words = Vec::new();
        for word in &words[1..] {
            let is_terminator = !word.quoted
                && (matches!(word.text.as_str(), "(" | ")" | ",")
                    || TYPE_TERMINATORS
                        .iter()
                        .any(|kw| word.text.eq_ignore_ascii_case(kw)));
            if is_terminator {
                break;
            }
            type_words.push(word.text.as_str());
        }
        let type_name = type_words.join(" ");

        let is_integer_primary_key = type_name.eq_ignore_ascii_case("integer")
            && has_keyword_pair(&words, "PRIMARY", "KEY");

        columns.push(ColumnDef {
            name: column_name,
            type_name,
            is_integer_primary_key,
        });
    }

    if columns.is_empty() {
        return Err(ScanError::SchemaUnparseable {
            name: name.to_owned(),
            detail: "no columns found".to_owned(),
        });
    }
    Ok(columns)
}

/// Parse the target table and indexed columns out of a CREATE INDEX
/// statement. The identifier list sits between the first `(` after the
/// `ON <table>` clause and the last `)`; quote handling is best-effort.
pub fn parse_create_index(name: &str, sql: &str) -> Result<IndexDef> {
    let words = split_words(sql);
    let on_pos = words
        .iter()
        .position(|w| !w.quoted && w.text.eq_ignore_ascii_case("ON"))
        .ok_or_else(|| ScanError::SchemaUnparseable {
            name: name.to_owned(),
            detail: "CREATE INDEX without ON clause".to_owned(),
        })?;
    let table = words
        .get(on_pos + 1)
        .ok_or_else(|| ScanError::SchemaUnparseable {
            name: name.to_owned(),
            detail: "CREATE INDEX without a table name".to_owned(),
        })?
        .text
        .clone();

    let after_on = byte_offset_of_word(sql, on_pos + 1);
    let body = paren_body(&sql[after_on..]).ok_or_else(|| ScanError::SchemaUnparseable {
        name: name.to_owned(),
        detail: "CREATE INDEX without a column list".to_owned(),
    })?;

    let mut columns = Vec::new();
    for piece in split_top_level(body) {
        let words = split_words(piece);
        if let Some(first) = words.first() {
            columns.push(first.text.clone());
        }
    }
    if columns.is_empty() {
        return Err(ScanError::SchemaUnparseable {
            name: name.to_owned(),
            detail: "no indexed columns found".to_owned(),
        });
    }
    Ok(IndexDef { table, columns })
}

/// The text between the first top-level `(` and the matching last `)`.
fn paren_body(sql: &str) -> Option<&str> {
    let start = sql.find('(')?;
    let end = sql.rfind(')')?;
    if end <= start {
        return None;
    }
    Some(&sql[start + 1..end])
}

/// Split on commas outside parentheses and quotes.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '[' => quote = Some(']'),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    pieces.push(body[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    let tail = body[start..].trim();
    if !tail.is_empty() {
        pieces.push(tail);
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

#[derive(Debug, Clone)]
struct Word {
    text: String,
    quoted: bool,
}

/// Split a definition into words, keeping quoted identifiers (with spaces)
/// intact and dropping the quotes.
fn split_words(piece: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut chars = piece.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if let Some(close) = match c {
            '"' => Some('"'),
            '`' => Some('`'),
            '\'' => Some('\''),
            '[' => Some(']'),
            _ => None,
        } {
            chars.next();
            let inner_start = start + c.len_utf8();
            let mut inner_end = piece.len();
            for (i, ch) in chars.by_ref() {
                if ch == close {
                    inner_end = i;
                    break;
                }
            }
            words.push(Word {
                text: piece[inner_start..inner_end].to_owned(),
                quoted: true,
            });
            continue;
        }
        // Punctuation stands alone so type parsing can stop at it.
        if matches!(c, '(' | ')' | ',') {
            chars.next();
            words.push(Word {
                text: c.to_string(),
                quoted: false,
            });
            continue;
        }
        let mut end = piece.len();
        while let Some(&(i, ch)) = chars.peek() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | ',') {
                end = i;
                break;
            }
            chars.next();
            end = i + ch.len_utf8();
        }
        words.push(Word {
            text: piece[start..end].to_owned(),
            quoted: false,
        });
    }
    words
}

fn has_keyword_pair(words: &[Word], first: &str, second: &str) -> bool {
    words.windows(2).any(|pair| {
        !pair[0].quoted
            && !pair[1].quoted
            && pair[0].text.eq_ignore_ascii_case(first)
            && pair[1].text.eq_ignore_ascii_case(second)
    })
}

/// Byte offset where the `n`-th word (as produced by [`split_words`])
/// begins. Used to scan for the column list after the table name.
fn byte_offset_of_word(sql: &str, n: usize) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for (i, c) in sql.char_indices() {
        let boundary = c.is_whitespace();
        if !boundary && !in_word {
            if count == n {
                return i;
            }
            count += 1;
            in_word = true;
        } else if boundary {
            in_word = false;
        }
    }
    sql.len()
}

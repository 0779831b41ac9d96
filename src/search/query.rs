/// Search query parsing
///
/// Terms are whitespace separated. `field:value` limits a term to one field,
/// double quotes keep a phrase together, and `date_created:[FROM TO TO]` or
/// `date_modified:[FROM TO TO]` restrict by day. The result is an FTS5 MATCH
/// expression plus a list of date filters.
use crate::error::{LarkmError, LarkmResult};
use chrono::NaiveDate;

/// Query field names and the index columns they search
const FIELDS: &[(&str, &str)] = &[
    ("who", "erc_who"),
    ("what", "erc_what"),
    ("when", "erc_when"),
    ("where", "erc_where"),
    ("policy", "policy"),
    ("target", "target"),
    ("shoulder", "shoulder"),
    ("ark_string", "ark_string"),
    ("identifier", "identifier"),
];

const DATE_FIELDS: &[&str] = &["date_created", "date_modified"];

/// Inclusive day range on a date column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub column: &'static str,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Parsed form of a search query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// FTS5 MATCH expression, absent when the query only has date ranges
    pub match_expr: Option<String>,
    pub ranges: Vec<DateRange>,
}

fn invalid(message: impl Into<String>) -> LarkmError {
    LarkmError::InvalidQuery(message.into())
}

/// Split on whitespace, keeping `"..."` and `[...]` groups intact
fn tokenize(q: &str) -> LarkmResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;

    for c in q.chars() {
        match closing {
            Some(end) => {
                current.push(c);
                if c == end {
                    closing = None;
                }
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => {
                // Groups only open at the start of a term or of a field value
                let opens_group = current.is_empty() || current.ends_with(':');
                current.push(c);
                if opens_group {
                    closing = match c {
                        '"' => Some('"'),
                        '[' => Some(']'),
                        _ => None,
                    };
                }
            }
        }
    }

    if let Some(end) = closing {
        return Err(invalid(format!("Unterminated query group, expected '{}'.", end)));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Accepts YYYY-MM-DD and YYYYMMDD
pub fn parse_date(value: &str) -> LarkmResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .map_err(|_| invalid(format!("Invalid date {}.", value)))
}

fn parse_range(column: &'static str, value: &str) -> LarkmResult<DateRange> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| invalid(format!("Date range for {} must look like [FROM TO TO].", column)))?;

    let parts: Vec<&str> = inner.split_whitespace().collect();
    let (from, to) = match parts.as_slice() {
        [from, "TO", to] => (parse_date(from)?, parse_date(to)?),
        _ => {
            return Err(invalid(format!(
                "Date range for {} must look like [FROM TO TO].",
                column
            )))
        }
    };

    if from > to {
        return Err(invalid(format!("Date range for {} ends before it starts.", column)));
    }
    Ok(DateRange { column, from, to })
}

/// FTS5 string literal for a value, quotes stripped and re-escaped
fn phrase(value: &str) -> LarkmResult<String> {
    let bare = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    if bare.trim().is_empty() {
        return Err(invalid("Empty search term."));
    }
    Ok(format!("\"{}\"", bare.replace('"', "\"\"")))
}

/// Field name of a `field:value` token, if it is one
///
/// URLs (`https://...`) and ARK strings (`ark:...`) are plain terms.
fn field_prefix(token: &str) -> Option<(&str, &str)> {
    let (name, value) = token.split_once(':')?;
    let is_name = !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_');
    if !is_name || name == "ark" || value.starts_with('/') {
        return None;
    }
    Some((name, value))
}

/// Parse a search query
pub fn parse(q: &str) -> LarkmResult<ParsedQuery> {
    let tokens = tokenize(q)?;
    if tokens.is_empty() {
        return Err(invalid("Search query cannot be empty."));
    }

    let mut clauses = Vec::new();
    let mut ranges = Vec::new();

    for token in &tokens {
        match field_prefix(token) {
            Some((name, value)) => {
                if let Some(&column) = DATE_FIELDS.iter().find(|f| **f == name) {
                    let range = if value.starts_with('[') {
                        parse_range(column, value)?
                    } else {
                        let day = parse_date(value)?;
                        DateRange { column, from: day, to: day }
                    };
                    ranges.push(range);
                } else if let Some((_, column)) = FIELDS.iter().find(|(f, _)| *f == name) {
                    clauses.push(format!("{} : {}", column, phrase(value)?));
                } else {
                    return Err(invalid(format!("Unknown search field {}.", name)));
                }
            }
            None => clauses.push(phrase(token)?),
        }
    }

    Ok(ParsedQuery {
        match_expr: (!clauses.is_empty()).then(|| clauses.join(" AND ")),
        ranges,
    })
}

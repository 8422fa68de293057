//! Search queries over catalog entries.
//!
//! A query is a list of whitespace separated terms; double quotes keep
//! several words together. Every term must match:
//!
//! - `#123` on its own matches entries whose id contains `123`
//! - `>20`, `>=20`, `<20`, `<=20`, `=20` compare the page count
//! - `time>2020-01-01` (any of the operators above) compares the upload
//!   date, `time=2014-01-01..2015-01-01` keeps an inclusive date range
//! - `sort:id`, `sort:pages`, `sort:age` order the result (`sort:-pages`
//!   for descending)
//! - anything else is a case-insensitive substring of a tag name or the
//!   title

use crate::library::entry::Entry;
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Comparison operator for page counts and dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `=`
    Equal,
    /// `>=`
    GreaterOrEqual,
    /// `>`
    Greater,
}

impl Comparison {
    fn holds<T: Ord>(self, value: T, bound: T) -> bool {
        match self {
            Comparison::Less => value < bound,
            Comparison::LessOrEqual => value <= bound,
            Comparison::Equal => value == bound,
            Comparison::GreaterOrEqual => value >= bound,
            Comparison::Greater => value > bound,
        }
    }
}

/// A single filter term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Id contains these digits.
    Number(String),
    /// Page count comparison.
    Pages(Comparison, u32),
    /// Upload date comparison, in epoch milliseconds.
    Time(Comparison, i64),
    /// Upload date within `[from, to]`, in epoch milliseconds.
    TimeRange(i64, i64),
    /// Tag or title substring, lowercased.
    Text(String),
}

/// Sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Entry id.
    Id,
    /// Page count.
    Pages,
    /// Upload date.
    Age,
}

/// A parsed search query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Filter terms, all of which must match.
    pub terms: Vec<Term>,
    /// Sort key and whether it is descending.
    pub sort: Option<(SortField, bool)>,
}

impl Query {
    /// Parse a query string. Unknown syntax falls back to text terms.
    ///
    /// `#digits` is an id filter only when it is the sole filter word;
    /// next to other words it is matched as text.
    pub fn parse(input: &str) -> Self {
        let mut query = Query::default();
        let mut words = Vec::new();

        for token in tokenize(input) {
            let token = token.to_lowercase();

            if let Some(key) = token.strip_prefix("sort:")
                && let Some(sort) = parse_sort(key)
            {
                query.sort = Some(sort);
                continue;
            }

            words.push(token);
        }

        if let [word] = words.as_slice()
            && let Some(digits) = word.strip_prefix('#')
            && is_digits(digits)
        {
            query.terms.push(Term::Number(digits.to_string()));
            return query;
        }

        query.terms = words.into_iter().map(parse_term).collect();
        query
    }

    /// Whether an entry passes every term.
    pub fn matches(&self, entry: &Entry) -> bool {
        self.terms.iter().all(|term| match term {
            Term::Number(digits) => entry.number.to_string().contains(digits.as_str()),
            Term::Pages(op, bound) => op.holds(entry.pages, *bound),
            Term::Time(op, bound) => op.holds(upload_millis(entry), *bound),
            Term::TimeRange(from, to) => (*from..=*to).contains(&upload_millis(entry)),
            Term::Text(text) => {
                entry
                    .tag_names()
                    .any(|name| name.to_lowercase().contains(text.as_str()))
                    || entry
                        .title()
                        .is_some_and(|title| title.to_lowercase().contains(text.as_str()))
            }
        })
    }

    /// Filter and sort entries. Without a sort term the input order is kept.
    pub fn apply(&self, entries: &[Entry]) -> Vec<Entry> {
        let mut result: Vec<Entry> = entries
            .iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();

        if let Some((field, descending)) = self.sort {
            result.sort_by(|a, b| {
                let ordering = compare(field, a, b);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        result
    }
}

fn compare(field: SortField, a: &Entry, b: &Entry) -> Ordering {
    match field {
        SortField::Id => a.number.cmp(&b.number),
        SortField::Pages => a.pages.cmp(&b.pages),
        SortField::Age => upload_millis(a).cmp(&upload_millis(b)),
    }
}

/// Upload date in epoch milliseconds; undated entries count as 0.
fn upload_millis(entry: &Entry) -> i64 {
    entry
        .created_at()
        .map(|t| t.timestamp_millis())
        .unwrap_or(0)
}

fn parse_term(word: String) -> Term {
    if let Some(rest) = word.strip_prefix("time") {
        if let Some((from, to)) = rest.strip_prefix('=').and_then(|r| r.split_once(".."))
            && let (Some(from), Some(to)) = (parse_date(from), parse_date(to))
        {
            return Term::TimeRange(from, to);
        }

        if let Some((op, date)) = split_operator(rest)
            && let Some(bound) = parse_date(date)
        {
            return Term::Time(op, bound);
        }
    }

    if let Some((op, rest)) = split_operator(&word)
        && is_digits(rest)
        && let Ok(bound) = rest.parse()
    {
        return Term::Pages(op, bound);
    }

    Term::Text(word)
}

fn parse_sort(key: &str) -> Option<(SortField, bool)> {
    let (descending, name) = match key.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, key),
    };

    let field = match name {
        "id" => SortField::Id,
        "pages" => SortField::Pages,
        "age" => SortField::Age,
        _ => return None,
    };

    Some((field, descending))
}

/// Split a leading comparison operator off `token`.
fn split_operator(token: &str) -> Option<(Comparison, &str)> {
    const OPERATORS: [(&str, Comparison); 5] = [
        (">=", Comparison::GreaterOrEqual),
        ("<=", Comparison::LessOrEqual),
        (">", Comparison::Greater),
        ("<", Comparison::Less),
        ("=", Comparison::Equal),
    ];

    OPERATORS
        .iter()
        .find_map(|(prefix, op)| token.strip_prefix(prefix).map(|rest| (*op, rest)))
}

/// `YYYY-MM-DD` as UTC midnight in epoch milliseconds.
fn parse_date(s: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Split on whitespace, keeping double-quoted groups together.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => {
                if quoted && !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = !quoted;
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

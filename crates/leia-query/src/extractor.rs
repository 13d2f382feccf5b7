//! Entity extraction
//!
//! Rule-based extraction of the client name, reference period and line
//! status mentioned in a question. Nothing here is validated against the
//! database; absent entities are simply `None`.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use leia_core::config::DEFAULT_KNOWN_CLIENTS;

// ============================================================================
// Client
// ============================================================================

static CLIENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"cliente\s+(\w+)",
        r"do\s+cliente\s+(\w+)",
        r"no\s+cliente\s+(\w+)",
        r"para\s+o\s+cliente\s+(\w+)",
        r"customer\s+(\w+)",
        r"client\s+(\w+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Words a client pattern may capture that are never client names
const CLIENT_STOP_WORDS: &[&str] = &["o", "a", "os", "as", "do", "da", "dos", "das", "de", "com"];

/// Extract the client mentioned in a question, lower-cased.
///
/// Known clients are matched by substring first; otherwise the word after
/// "cliente"/"client"/"customer" is taken unless it is a stop word.
pub fn extract_client(question: &str, known_clients: &[String]) -> Option<String> {
    let lower = question.to_lowercase();

    if let Some(known) = known_clients.iter().find(|c| lower.contains(c.as_str())) {
        return Some(known.clone());
    }

    CLIENT_PATTERNS
        .iter()
        .filter_map(|re| re.captures(&lower))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .find(|word| !CLIENT_STOP_WORDS.contains(&word.as_str()))
}

// ============================================================================
// Period
// ============================================================================

const MONTHS: &[(&str, u32)] = &[
    ("janeiro", 1),
    ("fevereiro", 2),
    ("março", 3),
    ("marco", 3),
    ("abril", 4),
    ("maio", 5),
    ("junho", 6),
    ("julho", 7),
    ("agosto", 8),
    ("setembro", 9),
    ("outubro", 10),
    ("novembro", 11),
    ("dezembro", 12),
];

const MONTH_NAMES: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro",
    "Outubro", "Novembro", "Dezembro",
];

static YEAR_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"20\d{2}").ok());

/// A calendar month as written in the question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Month {
    /// 1-12
    pub number: u32,
    /// Capitalised as matched, e.g. "Dezembro" or "Marco"
    pub name: String,
}

impl Month {
    fn from_match(word: &str, number: u32) -> Self {
        Self {
            number,
            name: capitalize(word),
        }
    }

    /// Canonical Portuguese name for a month number
    pub fn from_number(number: u32) -> Option<Self> {
        let name = MONTH_NAMES.get(number.checked_sub(1)? as usize)?;
        Some(Self {
            number,
            name: name.to_string(),
        })
    }

    /// Two-digit month number
    pub fn padded(&self) -> String {
        format!("{:02}", self.number)
    }
}

/// Year and month mentioned in a question, each independently optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub year: Option<i32>,
    pub month: Option<Month>,
}

impl Period {
    /// Both parts, when the question names a specific month of a specific year
    pub fn year_month(&self) -> Option<(i32, &Month)> {
        Some((self.year?, self.month.as_ref()?))
    }

    /// `(year, "MM", month name)` as text
    pub fn as_parts(&self) -> (Option<String>, Option<String>, Option<String>) {
        (
            self.year.map(|y| y.to_string()),
            self.month.as_ref().map(Month::padded),
            self.month.as_ref().map(|m| m.name.clone()),
        )
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Extract year (`20xx`) and Portuguese month name.
///
/// Months are matched as whole words first; failing that, as a substring
/// bounded on both sides by a non-word character (so neither "dezembro2023"
/// nor "maior" yields a month).
pub fn extract_period(question: &str) -> Period {
    let year = YEAR_PATTERN
        .as_ref()
        .and_then(|re| re.find(question))
        .and_then(|m| m.as_str().parse().ok());

    let lower = question.to_lowercase();

    let whole_word = lower
        .split(|c: char| !is_word_char(c))
        .find_map(|word| {
            MONTHS
                .iter()
                .find(|(name, _)| *name == word)
                .map(|(name, number)| Month::from_match(name, *number))
        });

    let month = whole_word.or_else(|| {
        MONTHS.iter().find_map(|(name, number)| {
            lower
                .match_indices(name)
                .any(|(at, _)| {
                    let before = lower[..at].chars().next_back();
                    let after = lower[at + name.len()..].chars().next();
                    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
                })
                .then(|| Month::from_match(name, *number))
        })
    });

    Period { year, month }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Status
// ============================================================================

/// License status of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Active,
    Blocked,
    Cancelled,
}

impl LineStatus {
    /// The Portuguese word used in questions and in the status column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ativa",
            Self::Blocked => "bloqueada",
            Self::Cancelled => "cancelada",
        }
    }
}

/// First of ativa, bloqueada, cancelada contained in the question
pub fn extract_status(question: &str) -> Option<LineStatus> {
    let lower = question.to_lowercase();
    [LineStatus::Active, LineStatus::Blocked, LineStatus::Cancelled]
        .into_iter()
        .find(|s| lower.contains(s.as_str()))
}

// ============================================================================
// Time scope
// ============================================================================

/// Which period a handler should aggregate over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeScope {
    /// "atualmente", "mês atual", "mês vigente"
    CurrentMonth,
    /// An explicit month of an explicit year
    Month { year: i32, month: Month },
    /// "últimos 3 meses"
    LastThreeMonths,
    Unspecified,
}

impl TimeScope {
    /// Current month beats an explicit month, which beats the last three months
    pub fn detect(question: &str, period: &Period) -> Self {
        let lower = question.to_lowercase();

        if ["atualmente", "mês atual", "mês vigente"]
            .iter()
            .any(|w| lower.contains(w))
        {
            return Self::CurrentMonth;
        }

        if let Some((year, month)) = period.year_month() {
            return Self::Month {
                year,
                month: month.clone(),
            };
        }

        if lower.contains("último")
            && lower.contains('3')
            && (lower.contains("mês") || lower.contains("mes"))
        {
            return Self::LastThreeMonths;
        }

        Self::Unspecified
    }
}

/// `[first day of (month - 3), first day of month)` for the month containing `today`
pub fn last_three_months(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = today.with_day(1).unwrap_or(today);
    let start = end
        .checked_sub_months(chrono::Months::new(3))
        .unwrap_or(end);
    (start, end)
}

// ============================================================================
// Extractor
// ============================================================================

/// Everything extracted from one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub client: Option<String>,
    pub period: Period,
    pub status: Option<LineStatus>,
}

/// Entity extractor configured with the deployment's known clients
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    known_clients: Vec<String>,
}

impl EntityExtractor {
    pub fn new(known_clients: Vec<String>) -> Self {
        Self {
            known_clients: known_clients.into_iter().map(|c| c.to_lowercase()).collect(),
        }
    }

    pub fn extract(&self, question: &str) -> Entities {
        Entities {
            client: extract_client(question, &self.known_clients),
            period: extract_period(question),
            status: extract_status(question),
        }
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_KNOWN_CLIENTS.iter().map(|c| c.to_string()).collect())
    }
}

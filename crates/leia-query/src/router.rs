//! Intent routing
//!
//! Picks one of the five table handlers from the wording of the question.
//! Checks run in a fixed priority order and the first match wins; anything
//! unrecognised falls through to supplier costs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Query category, one per business table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Line term status (`ia_termos_numeros`)
    Terms,
    /// Per-user costs (`ia_custo_usuarios_linhas`)
    UserCosts,
    /// Idle lines (`ia_linhas_ociosas`)
    IdleLines,
    /// Line inventory (`ia_linhas`)
    Lines,
    /// Supplier costs (`ia_custo_fornecedor`)
    SupplierCosts,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terms => "terms",
            Self::UserCosts => "user_costs",
            Self::IdleLines => "idle_lines",
            Self::Lines => "lines",
            Self::SupplierCosts => "supplier_costs",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const TERM_WORDS: &[&str] = &[
    "termo",
    "termos",
    "possui termo",
    "não possuem termo",
    "nao possuem termo",
    "sem termo",
];

const USER_WORDS: &[&str] = &["usuário", "usuario"];

const IDLE_WORDS: &[&str] = &["ociosa", "ociosas", "ocioso", "ociosos"];

const LINE_WORDS: &[&str] = &[
    "linha",
    "licenca",
    "status",
    "ativa",
    "bloqueada",
    "cancelada",
    "total_linhas",
];

static USER_COST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"usuário.*maior.*custo",
        r"usuario.*maior.*custo",
        r"maior.*custo.*usuário",
        r"maior.*custo.*usuario",
        r"custo.*usuário",
        r"custo.*usuario",
        r"usuário.*custo",
        r"usuario.*custo",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Classify a question
pub fn route(question: &str) -> Intent {
    let lower = question.to_lowercase();

    if contains_any(&lower, TERM_WORDS) {
        return Intent::Terms;
    }

    if USER_COST_PATTERNS.iter().any(|re| re.is_match(&lower))
        || (contains_any(&lower, USER_WORDS) && lower.contains("custo"))
    {
        return Intent::UserCosts;
    }

    if contains_any(&lower, IDLE_WORDS) {
        return Intent::IdleLines;
    }

    if contains_any(&lower, LINE_WORDS) {
        return Intent::Lines;
    }

    Intent::SupplierCosts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_wins_over_lines() {
        assert_eq!(
            route("Quantas linhas ociosas tem o cliente Safra?"),
            Intent::IdleLines
        );
    }

    #[test]
    fn test_terms_have_priority() {
        assert_eq!(
            route("Quantas linhas não possuem termo no cliente Safra?"),
            Intent::Terms
        );
        assert_eq!(
            route("Quantas linhas ociosas sem termo?"),
            Intent::Terms
        );
    }

    #[test]
    fn test_user_costs() {
        assert_eq!(
            route("Qual usuário teve o maior custo em dezembro de 2023?"),
            Intent::UserCosts
        );
        assert_eq!(
            route("Maior custo por usuario do cliente Sonda"),
            Intent::UserCosts
        );
    }

    #[test]
    fn test_lines() {
        assert_eq!(route("Quantas linhas ativas o Safra possui?"), Intent::Lines);
        assert_eq!(route("Total de licenças bloqueada"), Intent::Lines);
        assert_eq!(route("STATUS das contas"), Intent::Lines);
    }

    #[test]
    fn test_default_is_supplier_costs() {
        assert_eq!(
            route("Qual o fornecedor com maior custo em janeiro de 2024?"),
            Intent::SupplierCosts
        );
        assert_eq!(route(""), Intent::SupplierCosts);
    }
}

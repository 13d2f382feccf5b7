//! Brazilian number formatting
//!
//! Currency renders as `R$ 1.234.567,89` (period for thousands, comma for
//! decimals); integers render with period thousands separators only.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Amounts with exactly two fraction digits, optionally already prefixed with `R$`
static MONEY_IN_TEXT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?:R\$\s*)?(\b\d{1,3}(?:[.,]\d{3})*[.,]\d{2}\b|\b\d+[.,]\d{2}\b)").ok()
});

/// Format a value as Brazilian currency
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "R$ 0,00".to_string();
    }

    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    // -0.001 rounds to 0,00 and must not keep its sign
    let sign = if value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };

    format!("R$ {sign}{},{frac_part}", group_thousands(int_part))
}

/// Currency for a nullable value; `None` renders as zero
pub fn format_currency_opt(value: Option<f64>) -> String {
    value.map(format_currency).unwrap_or_else(|| "R$ 0,00".to_string())
}

/// Format a number as an integer with period thousands separators
pub fn format_integer(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = value.round_ties_even() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let sign = if rounded < 0 { "-" } else { "" };
    format!("{sign}{}", group_thousands(&digits))
}

/// Integer formatting for a nullable value; `None` renders as "0"
pub fn format_integer_opt(value: Option<f64>) -> String {
    value.map(format_integer).unwrap_or_else(|| "0".to_string())
}

/// Parse a Brazilian currency string such as `R$ 1.234,56` back to a number
pub fn parse_currency(text: &str) -> Option<f64> {
    let cleaned = text
        .replace("R$", "")
        .replace('.', "")
        .replace(',', ".")
        .replace(char::is_whitespace, "");
    cleaned.parse().ok()
}

/// Rewrite every two-decimal amount found in free text as Brazilian currency.
///
/// The decimal separator is taken to be the last `.` or `,` of the match, so
/// both `1,234.56` and `1.234,56` become `R$ 1.234,56`. An amount that already
/// carries `R$` keeps a single prefix.
pub fn reformat_currency_in_text(text: &str) -> String {
    let Some(re) = MONEY_IN_TEXT.as_ref() else {
        return text.to_string();
    };

    re.replace_all(text, |caps: &Captures<'_>| {
        let raw = &caps[1];
        match normalize_amount(raw) {
            Some(value) => format_currency(value),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

fn normalize_amount(raw: &str) -> Option<f64> {
    let decimal_at = raw.rfind(['.', ','])?;
    let (int_part, frac_part) = (&raw[..decimal_at], &raw[decimal_at + 1..]);
    let digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    format!("{digits}.{frac_part}").parse().ok()
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

//! Phone matching rules used to correlate a recording with a lead.

use std::fmt;

/// Strategy names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MatchStrategyKind {
    Exact,
    Suffix,
}

/// How a recording's phone number is matched against lead phone values.
///
/// `Suffix` is lenient: two different numbers that share their last digits
/// match each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    #[default]
    Exact,
    Suffix { digits: usize },
}

impl MatchStrategy {
    /// Value sent as the CRM phone filter.
    pub fn search_key(&self, phone: &str) -> String {
        match self {
            MatchStrategy::Exact => phone.to_string(),
            MatchStrategy::Suffix { digits } => last_digits(phone, *digits),
        }
    }

    /// Whether a lead phone value matches `phone` under this strategy.
    /// Formatting characters are ignored on both sides.
    pub fn accepts(&self, phone: &str, candidate: &str) -> bool {
        let wanted = digits_only(phone);
        let have = digits_only(candidate);
        if wanted.is_empty() || have.is_empty() {
            return false;
        }
        match self {
            MatchStrategy::Exact => wanted == have,
            MatchStrategy::Suffix { digits } => {
                let key = last_digits(&wanted, *digits);
                have.ends_with(&key)
            }
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::Exact => write!(f, "exact"),
            MatchStrategy::Suffix { digits } => write!(f, "suffix({})", digits),
        }
    }
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn last_digits(value: &str, n: usize) -> String {
    let digits = digits_only(value);
    let skip = digits.len().saturating_sub(n);
    digits[skip..].to_string()
}

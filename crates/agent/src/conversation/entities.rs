use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use propbot_core::domain::conversation::ExtractedEntities;
use propbot_core::domain::lead::{InquiryType, Timeline};

/// Budget forms, tried in order; the first match is the estimate.
static BUDGET_PATTERNS: Lazy<Vec<(Regex, Decimal)>> = Lazy::new(|| {
    vec![
        (compile(r"(?i)(\d+(?:\.\d+)?)\s*(?:lakhs?|lacs?)\b"), Decimal::new(100_000, 0)),
        (compile(r"(?i)(\d+(?:\.\d+)?)\s*(?:crores?|cr)\b"), Decimal::new(10_000_000, 0)),
        (compile(r"(?i)(?:\brs\.?|₹|\binr)\s*(\d+(?:,\d+)*(?:\.\d+)?)"), Decimal::ONE),
    ]
});

static BHK_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"(?i)(\d+)\s*bhk"));

const PROPERTY_KEYWORDS: &[&str] =
    &["apartment", "villa", "plot", "house", "flat", "studio", "penthouse", "duplex"];

static PROPERTY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    PROPERTY_KEYWORDS
        .iter()
        .map(|keyword| (*keyword, compile(&format!(r"(?i)\b{keyword}s?\b"))))
        .collect()
});

static TIMELINE_PATTERNS: Lazy<Vec<(Timeline, Regex)>> = Lazy::new(|| {
    vec![
        (Timeline::Immediate, compile(r"(?i)urgent|immediate|asap|right now|this week")),
        (
            Timeline::OneToThreeMonths,
            compile(r"(?i)within.*month|next.*month|1-3 months|few weeks"),
        ),
        (Timeline::ThreeToSixMonths, compile(r"(?i)3-6 months|quarter|few months|3 to 6")),
        (Timeline::SixMonthsPlus, compile(r"(?i)6 months|next year|long term|eventually")),
    ]
});

/// Buy outranks rent, which outranks sell.
static INQUIRY_PATTERNS: Lazy<Vec<(InquiryType, Regex)>> = Lazy::new(|| {
    vec![
        (InquiryType::Buy, compile(r"(?i)\b(buy|purchase|buying)\b")),
        (InquiryType::Rent, compile(r"(?i)\b(rent|rental|renting|lease)\b")),
        (InquiryType::Sell, compile(r"(?i)\b(sell|selling)\b")),
    ]
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("entity pattern must compile")
}

/// Parses budget, property type, timeline and inquiry type out of free text.
#[derive(Clone, Debug, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, message: &str) -> ExtractedEntities {
        ExtractedEntities {
            budget: extract_budget(message),
            property_type: extract_property_type(message),
            timeline: first_match(&TIMELINE_PATTERNS, message),
            inquiry_type: first_match(&INQUIRY_PATTERNS, message),
        }
    }
}

fn extract_budget(message: &str) -> Option<Decimal> {
    BUDGET_PATTERNS.iter().find_map(|(pattern, multiplier)| {
        let amount = pattern.captures(message)?.get(1)?.as_str().replace(',', "");
        let amount = Decimal::from_str(&amount).ok()?;
        amount.checked_mul(*multiplier).map(|value| value.normalize())
    })
}

/// Size token first, then every keyword found, space-joined. Keywords
/// accumulate without de-duplication.
fn extract_property_type(message: &str) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(bedrooms) = BHK_PATTERN.captures(message).and_then(|captures| captures.get(1)) {
        parts.push(format!("{} BHK", bedrooms.as_str()));
    }

    parts.extend(
        PROPERTY_PATTERNS
            .iter()
            .filter(|(_, pattern)| pattern.is_match(message))
            .map(|(keyword, _)| keyword.to_string()),
    );

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn first_match<T: Copy>(table: &[(T, Regex)], message: &str) -> Option<T> {
    table.iter().find(|(_, pattern)| pattern.is_match(message)).map(|(value, _)| *value)
}

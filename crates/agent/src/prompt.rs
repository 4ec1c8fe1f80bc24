//! System instruction rendered from a lead snapshot.
//!
//! The template lists what is known, marks what is missing and names the next
//! field to ask for. Tone and length constraints live in the template text.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tera::{Context, Tera};
use thiserror::Error;

use propbot_core::domain::lead::LeadProfile;
use propbot_core::errors::ApplicationError;

const TEMPLATE_NAME: &str = "qualification_system";
const TEMPLATE: &str = include_str!("../../../templates/prompts/qualification_system.tera");
const DEFAULT_AGENCY: &str = "a real estate agency";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template error: {0}")]
    Template(#[from] tera::Error),
}

impl From<PromptError> for ApplicationError {
    fn from(error: PromptError) -> Self {
        ApplicationError::Configuration(error.to_string())
    }
}

/// Qualification fields in the order the assistant should ask for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingField {
    Name,
    InquiryType,
    Budget,
    Location,
    PropertyType,
    Timeline,
}

impl MissingField {
    pub const PRIORITY: [MissingField; 6] = [
        Self::Name,
        Self::InquiryType,
        Self::Budget,
        Self::Location,
        Self::PropertyType,
        Self::Timeline,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "their name",
            Self::InquiryType => "whether they want to buy, rent or sell",
            Self::Budget => "their budget range",
            Self::Location => "their preferred location",
            Self::PropertyType => "the type of property",
            Self::Timeline => "when they want to move",
        }
    }

    fn is_missing(&self, profile: &LeadProfile) -> bool {
        match self {
            Self::Name => blank(profile.name.as_deref()),
            Self::InquiryType => profile.inquiry_type.is_none(),
            Self::Budget => profile.budget.is_none(),
            Self::Location => blank(profile.location_preference.as_deref()),
            Self::PropertyType => blank(profile.property_type.as_deref()),
            Self::Timeline => profile.timeline.is_none(),
        }
    }
}

pub fn missing_fields(profile: &LeadProfile) -> Vec<MissingField> {
    MissingField::PRIORITY.into_iter().filter(|field| field.is_missing(profile)).collect()
}

fn blank(value: Option<&str>) -> bool {
    value.map(|text| text.trim().is_empty()).unwrap_or(true)
}

#[derive(Clone, Debug)]
pub struct PromptBuilder {
    tera: Tera,
    agency: String,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, PromptError> {
        Self::for_agency(DEFAULT_AGENCY)
    }

    pub fn for_agency(agency: impl Into<String>) -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.register_filter("inr", inr_filter);
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self { tera, agency: agency.into() })
    }

    pub fn build(&self, profile: &LeadProfile) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("agency", &self.agency);
        context.insert("name", &non_blank(profile.name.as_deref()));
        context.insert("phone", &non_blank(profile.phone.as_deref()));
        context.insert("email", &non_blank(profile.email.as_deref()));
        context.insert("inquiry_type", &profile.inquiry_type.map(|kind| kind.as_str()));
        context.insert("budget_min", &profile.budget.map(|budget| budget.min.to_string()));
        context.insert("budget_max", &profile.budget.map(|budget| budget.max.to_string()));
        context.insert("location", &non_blank(profile.location_preference.as_deref()));
        context.insert("property_type", &non_blank(profile.property_type.as_deref()));
        context.insert("timeline", &profile.timeline.map(|timeline| timeline.as_str()));
        context.insert(
            "next_missing",
            &missing_fields(profile).first().map(MissingField::label),
        );

        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

/// Rupee amount with Indian digit grouping, e.g. `4000000` → `₹40,00,000`.
fn inr_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let raw = match value {
        tera::Value::String(text) => text.clone(),
        tera::Value::Number(number) => number.to_string(),
        _ => return Err(tera::Error::msg("inr filter expects a number or numeric string")),
    };
    let amount: Decimal =
        raw.parse().map_err(|_| tera::Error::msg(format!("`{raw}` is not a rupee amount")))?;
    Ok(tera::Value::String(format_inr(amount)))
}

pub(crate) fn format_inr(amount: Decimal) -> String {
    let amount = amount.round_dp(2).normalize();
    let text = amount.abs().to_string();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::new();
    let (head, tail) = whole.split_at(whole.len().saturating_sub(3));
    let head_digits: Vec<char> = head.chars().collect();
    for (index, digit) in head_digits.iter().enumerate() {
        if index > 0 && (head_digits.len() - index) % 2 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit);
    }
    if !head.is_empty() {
        grouped.push(',');
    }
    grouped.push_str(tail);

    let sign = if amount.is_sign_negative() { "-" } else { "" };
    match fraction {
        Some(fraction) => format!("{sign}₹{grouped}.{fraction}"),
        None => format!("{sign}₹{grouped}"),
    }
}

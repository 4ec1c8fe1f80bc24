use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusinessId(pub String);

impl fmt::Display for BusinessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryType {
    Buy,
    Rent,
    Sell,
}

impl InquiryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Rent => "rent",
            Self::Sell => "sell",
        }
    }
}

impl FromStr for InquiryType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "buy" => Ok(Self::Buy),
            "rent" => Ok(Self::Rent),
            "sell" => Ok(Self::Sell),
            other => Err(DomainError::unrecognized("inquiry_type", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeline {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "1-3months")]
    OneToThreeMonths,
    #[serde(rename = "3-6months")]
    ThreeToSixMonths,
    #[serde(rename = "6months+")]
    SixMonthsPlus,
}

impl Timeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::OneToThreeMonths => "1-3months",
            Self::ThreeToSixMonths => "3-6months",
            Self::SixMonthsPlus => "6months+",
        }
    }
}

impl FromStr for Timeline {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "immediate" => Ok(Self::Immediate),
            "1-3months" => Ok(Self::OneToThreeMonths),
            "3-6months" => Ok(Self::ThreeToSixMonths),
            "6months+" => Ok(Self::SixMonthsPlus),
            other => Err(DomainError::unrecognized("timeline", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
}

impl Temperature {
    pub const HOT_THRESHOLD: u8 = 70;
    pub const WARM_THRESHOLD: u8 = 40;

    /// Temperature is a pure function of the score; nothing else may assign it.
    pub fn from_score(score: u8) -> Self {
        if score >= Self::HOT_THRESHOLD {
            Self::Hot
        } else if score >= Self::WARM_THRESHOLD {
            Self::Warm
        } else {
            Self::Cold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }
}

impl FromStr for Temperature {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hot" => Ok(Self::Hot),
            "warm" => Ok(Self::Warm),
            "cold" => Ok(Self::Cold),
            other => Err(DomainError::unrecognized("temperature", other)),
        }
    }
}

/// Budget is only ever stored as a closed range; a lone bound is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl BudgetRange {
    pub fn new(min: Decimal, max: Decimal) -> Result<Self, DomainError> {
        if min > max {
            return Err(DomainError::InvariantViolation(format!(
                "budget min {min} exceeds max {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Widens a point estimate to [0.8x, 1.2x]. `None` when the upper bound
    /// does not fit in a `Decimal`.
    pub fn around(estimate: Decimal) -> Option<Self> {
        Some(Self {
            min: estimate.checked_mul(Decimal::new(8, 1))?.normalize(),
            max: estimate.checked_mul(Decimal::new(12, 1))?.normalize(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationState {
    #[default]
    New,
    Collecting,
    Qualified,
    Scheduling,
}

impl QualificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Collecting => "collecting",
            Self::Qualified => "qualified",
            Self::Scheduling => "scheduling",
        }
    }
}

impl FromStr for QualificationState {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "new" => Ok(Self::New),
            "collecting" => Ok(Self::Collecting),
            "qualified" => Ok(Self::Qualified),
            "scheduling" => Ok(Self::Scheduling),
            other => Err(DomainError::unrecognized("qualification_state", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadProfile {
    pub id: LeadId,
    pub business_id: BusinessId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub inquiry_type: Option<InquiryType>,
    pub budget: Option<BudgetRange>,
    pub location_preference: Option<String>,
    pub property_type: Option<String>,
    pub timeline: Option<Timeline>,
    pub score: u8,
    pub temperature: Temperature,
    pub qualification_state: QualificationState,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeadProfile {
    /// A freshly onboarded lead: only identity and phone known, score zero.
    pub fn new(id: LeadId, business_id: BusinessId, phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            business_id,
            name: None,
            email: None,
            phone: Some(phone.into()),
            source: None,
            inquiry_type: None,
            budget: None,
            location_preference: None,
            property_type: None,
            timeline: None,
            score: 0,
            temperature: Temperature::Cold,
            qualification_state: QualificationState::New,
            last_contact_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Budget, location and property type are all known.
    pub fn has_core_requirements(&self) -> bool {
        self.budget.is_some()
            && has_text(self.location_preference.as_deref())
            && has_text(self.property_type.as_deref())
    }

    pub fn has_any_requirement(&self) -> bool {
        self.inquiry_type.is_some()
            || self.budget.is_some()
            || has_text(self.location_preference.as_deref())
            || has_text(self.property_type.as_deref())
            || self.timeline.is_some()
    }
}

pub(crate) fn has_text(value: Option<&str>) -> bool {
    value.map(|text| !text.trim().is_empty()).unwrap_or(false)
}

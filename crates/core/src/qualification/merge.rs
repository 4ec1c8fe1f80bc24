use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::conversation::ExtractedEntities;
use crate::domain::lead::{BudgetRange, InquiryType, LeadProfile, Timeline};

/// Field-level profile patch. `None` means "leave the stored value alone".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeadProfileUpdate {
    pub inquiry_type: Option<InquiryType>,
    pub budget: Option<BudgetRange>,
    pub property_type: Option<String>,
    pub timeline: Option<Timeline>,
    pub last_contact_at: Option<DateTime<Utc>>,
}

impl LeadProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.inquiry_type.is_none()
            && self.budget.is_none()
            && self.property_type.is_none()
            && self.timeline.is_none()
            && self.last_contact_at.is_none()
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.inquiry_type.is_some() {
            fields.push("inquiry_type");
        }
        if self.budget.is_some() {
            fields.push("budget");
        }
        if self.property_type.is_some() {
            fields.push("property_type");
        }
        if self.timeline.is_some() {
            fields.push("timeline");
        }
        if self.last_contact_at.is_some() {
            fields.push("last_contact_at");
        }
        fields
    }

    /// Applies the patch in place. Absent fields never clear stored data.
    pub fn apply_to(&self, profile: &mut LeadProfile) {
        if let Some(inquiry_type) = self.inquiry_type {
            profile.inquiry_type = Some(inquiry_type);
        }
        if let Some(budget) = self.budget {
            profile.budget = Some(budget);
        }
        if let Some(property_type) = &self.property_type {
            profile.property_type = Some(property_type.clone());
        }
        if let Some(timeline) = self.timeline {
            profile.timeline = Some(timeline);
        }
        if let Some(last_contact_at) = self.last_contact_at {
            profile.last_contact_at = Some(last_contact_at);
            profile.updated_at = last_contact_at;
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LeadProfileMerger;

impl LeadProfileMerger {
    pub fn new() -> Self {
        Self
    }

    /// Builds the patch for `entities`. A budget estimate that is zero,
    /// negative, or too large to widen into a range is treated as not detected.
    pub fn merge(&self, entities: &ExtractedEntities, now: DateTime<Utc>) -> LeadProfileUpdate {
        let mut update = LeadProfileUpdate {
            inquiry_type: entities.inquiry_type,
            budget: entities
                .budget
                .filter(|estimate| *estimate > Decimal::ZERO)
                .and_then(BudgetRange::around),
            property_type: entities.property_type.clone(),
            timeline: entities.timeline,
            last_contact_at: None,
        };

        if !update.is_empty() {
            update.last_contact_at = Some(now);
        }

        update
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::LeadProfileMerger;
    use crate::domain::conversation::ExtractedEntities;
    use crate::domain::lead::{
        BudgetRange, BusinessId, InquiryType, LeadId, LeadProfile, Timeline,
    };

    fn profile() -> LeadProfile {
        let mut profile = LeadProfile::new(
            LeadId("lead-1".to_string()),
            BusinessId("biz-1".to_string()),
            "+919800000000",
        );
        profile.location_preference = Some("Whitefield".to_string());
        profile.property_type = Some("villa".to_string());
        profile.timeline = Some(Timeline::ThreeToSixMonths);
        profile
    }

    #[test]
    fn empty_extraction_produces_empty_update() {
        let update = LeadProfileMerger::new().merge(&ExtractedEntities::default(), Utc::now());

        assert!(update.is_empty());
        assert!(update.last_contact_at.is_none());
    }

    #[test]
    fn point_budget_becomes_range() {
        let entities = ExtractedEntities {
            budget: Some(Decimal::new(5_000_000, 0)),
            ..ExtractedEntities::default()
        };

        let update = LeadProfileMerger::new().merge(&entities, Utc::now());

        assert_eq!(
            update.budget,
            Some(BudgetRange { min: Decimal::new(4_000_000, 0), max: Decimal::new(6_000_000, 0) })
        );
        assert!(update.last_contact_at.is_some());
    }

    #[test]
    fn absent_fields_never_clear_existing_values() {
        let mut current = profile();
        let entities = ExtractedEntities {
            inquiry_type: Some(InquiryType::Buy),
            ..ExtractedEntities::default()
        };

        let update = LeadProfileMerger::new().merge(&entities, Utc::now());
        update.apply_to(&mut current);

        assert_eq!(current.inquiry_type, Some(InquiryType::Buy));
        assert_eq!(current.property_type.as_deref(), Some("villa"));
        assert_eq!(current.location_preference.as_deref(), Some("Whitefield"));
        assert_eq!(current.timeline, Some(Timeline::ThreeToSixMonths));
        assert_eq!(update.changed_fields(), vec!["inquiry_type", "last_contact_at"]);
    }

    #[test]
    fn present_fields_overwrite() {
        let mut current = profile();
        let entities = ExtractedEntities {
            property_type: Some("2 BHK apartment".to_string()),
            timeline: Some(Timeline::Immediate),
            ..ExtractedEntities::default()
        };

        LeadProfileMerger::new().merge(&entities, Utc::now()).apply_to(&mut current);

        assert_eq!(current.property_type.as_deref(), Some("2 BHK apartment"));
        assert_eq!(current.timeline, Some(Timeline::Immediate));
    }

    #[test]
    fn zero_budget_is_ignored() {
        let entities =
            ExtractedEntities { budget: Some(Decimal::ZERO), ..ExtractedEntities::default() };

        let update = LeadProfileMerger::new().merge(&entities, Utc::now());

        assert!(update.is_empty());
    }

    #[test]
    fn budget_too_large_for_a_range_is_ignored() {
        let entities = ExtractedEntities {
            budget: Some(Decimal::from_str("70000000000000000000000000000").expect("decimal")),
            ..ExtractedEntities::default()
        };

        let update = LeadProfileMerger::new().merge(&entities, Utc::now());

        assert!(update.budget.is_none());
        assert!(update.is_empty());
    }
}

//! Lead scoring.
//!
//! The weights are a fixed contract: contact details are worth up to 30
//! points, property requirements up to 40, timeline up to 20 and engagement
//! (turn count) up to 10. The sum is capped at 100.

use serde::{Deserialize, Serialize};

use crate::domain::lead::{has_text, LeadProfile, Temperature, Timeline};

pub const MAX_SCORE: u8 = 100;

/// Point values for each qualification signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    pub name: u8,
    pub email: u8,
    pub phone: u8,
    pub budget_range: u8,
    pub location: u8,
    pub property_type: u8,
    pub timeline_immediate: u8,
    pub timeline_one_to_three_months: u8,
    pub timeline_three_to_six_months: u8,
    pub timeline_six_months_plus: u8,
    /// Awarded at `HIGH_ENGAGEMENT_TURNS` or more.
    pub high_engagement: u8,
    /// Awarded at `MODERATE_ENGAGEMENT_TURNS` up to the high threshold.
    pub moderate_engagement: u8,
}

pub const HIGH_ENGAGEMENT_TURNS: u64 = 5;
pub const MODERATE_ENGAGEMENT_TURNS: u64 = 3;

pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights {
    name: 10,
    email: 10,
    phone: 10,
    budget_range: 20,
    location: 10,
    property_type: 10,
    timeline_immediate: 20,
    timeline_one_to_three_months: 15,
    timeline_three_to_six_months: 10,
    timeline_six_months_plus: 5,
    high_engagement: 10,
    moderate_engagement: 5,
};

impl Default for ScoringWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadScore {
    pub score: u8,
    pub temperature: Temperature,
}

impl LeadScore {
    pub fn from_points(points: u32) -> Self {
        let score = points.min(u32::from(MAX_SCORE)) as u8;
        Self { score, temperature: Temperature::from_score(score) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeadScorer {
    weights: ScoringWeights,
}

impl LeadScorer {
    pub fn new() -> Self {
        Self { weights: ScoringWeights::default() }
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Scores a profile snapshot. Missing optional fields contribute nothing.
    pub fn score(&self, profile: &LeadProfile, turn_count: u64) -> LeadScore {
        let w = &self.weights;
        let mut points = 0u32;

        if has_text(profile.name.as_deref()) {
            points += u32::from(w.name);
        }
        if has_text(profile.email.as_deref()) {
            points += u32::from(w.email);
        }
        if has_text(profile.phone.as_deref()) {
            points += u32::from(w.phone);
        }

        if profile.budget.is_some() {
            points += u32::from(w.budget_range);
        }
        if has_text(profile.location_preference.as_deref()) {
            points += u32::from(w.location);
        }
        if has_text(profile.property_type.as_deref()) {
            points += u32::from(w.property_type);
        }

        points += u32::from(self.timeline_points(profile.timeline));
        points += u32::from(self.engagement_points(turn_count));

        LeadScore::from_points(points)
    }

    fn timeline_points(&self, timeline: Option<Timeline>) -> u8 {
        match timeline {
            Some(Timeline::Immediate) => self.weights.timeline_immediate,
            Some(Timeline::OneToThreeMonths) => self.weights.timeline_one_to_three_months,
            Some(Timeline::ThreeToSixMonths) => self.weights.timeline_three_to_six_months,
            Some(Timeline::SixMonthsPlus) => self.weights.timeline_six_months_plus,
            None => 0,
        }
    }

    fn engagement_points(&self, turn_count: u64) -> u8 {
        if turn_count >= HIGH_ENGAGEMENT_TURNS {
            self.weights.high_engagement
        } else if turn_count >= MODERATE_ENGAGEMENT_TURNS {
            self.weights.moderate_engagement
        } else {
            0
        }
    }
}

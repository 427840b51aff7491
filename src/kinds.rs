use std::fmt;

use serde::{Deserialize, Serialize};

pub const DOCUMENT_CATEGORIES: &[&str] = &[
    "passport",
    "visa",
    "flight",
    "hotel",
    "insurance",
    "ticket",
    "reservation",
    "other",
];

pub const CHECKLIST_CATEGORIES: &[&str] =
    &["documents", "packing", "bookings", "health", "money", "other"];

pub const TRANSPORT_KINDS: &[&str] = &["flight", "train", "bus", "ferry", "car", "taxi", "other"];

pub const POI_TYPES: &[&str] = &[
    "attraction",
    "restaurant",
    "viewpoint",
    "parking",
    "fuel",
    "lodging",
    "other",
];

/// Lower-cases the value and returns it when it is one of `allowed`.
pub fn normalize_choice(value: &str, allowed: &[&str]) -> Option<String> {
    let normalized = value.trim().to_lowercase();
    allowed
        .iter()
        .any(|candidate| *candidate == normalized)
        .then_some(normalized)
}

/// Itinerary rows that carry a price and can have payments recorded against
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Hotel,
    Transportation,
    CarRental,
    Restaurant,
    TouristSite,
}

impl ActivityType {
    pub const ALL: [ActivityType; 5] = [
        ActivityType::Hotel,
        ActivityType::Transportation,
        ActivityType::CarRental,
        ActivityType::Restaurant,
        ActivityType::TouristSite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Hotel => "hotel",
            ActivityType::Transportation => "transportation",
            ActivityType::CarRental => "car_rental",
            ActivityType::Restaurant => "restaurant",
            ActivityType::TouristSite => "tourist_site",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "unpaid" | "pending" => Some(PaymentStatus::Unpaid),
            "partial" | "partially_paid" => Some(PaymentStatus::Partial),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

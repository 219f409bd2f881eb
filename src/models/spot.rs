use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    pub id: String,
    pub name: String,
    pub address: String,
    pub price: f64,
    pub archived: bool,
    pub total_slots: i64,
    pub available_slots: i64,
    pub spots: Vec<SlotEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotEntry {
    pub spot_number: String,
    pub pillar: String,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SlotStatus {
    #[serde(rename = "available")]
    Available,
    #[serde(rename = "booked")]
    Booked,
    #[serde(rename = "notAvailable")]
    NotAvailable,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::NotAvailable => "notAvailable",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "available" => SlotStatus::Available,
            "booked" => SlotStatus::Booked,
            _ => SlotStatus::NotAvailable,
        }
    }
}

/// How a spot tracks its capacity.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CapacityModel {
    /// Only the `total_slots`/`available_slots` pair.
    Counter,
    /// Counters plus individually numbered entries.
    PerSlot,
}

/// What the reservation engine needs to know about a spot.
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub id: String,
    pub price: f64,
    pub archived: bool,
    pub capacity_model: CapacityModel,
}

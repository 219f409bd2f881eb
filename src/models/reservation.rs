use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub vehicle_id: String,
    pub slot_id: String,
    pub status: ReservationStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub amount: f64,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub confirmation_code: Option<String>,
    pub payment: Option<Payment>,
    pub spot_number: Option<String>,
    pub capacity_claimed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Whether the hold fuse has burnt down at `now`.
    pub fn hold_lapsed(&self, now: &DateTime<Utc>) -> bool {
        self.hold_expires_at.map(|t| *now >= t).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Held,
    Confirmed,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Held => "held",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "held" => Some(ReservationStatus::Held),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "cancelled" => Some(ReservationStatus::Cancelled),
            "expired" => Some(ReservationStatus::Expired),
            _ => None,
        }
    }

    /// Held and confirmed reservations occupy their slot window.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Held | ReservationStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub provider: String,
    pub intent_id: Option<String>,
    pub status: String,
}

impl Payment {
    pub fn offline(status: Option<String>) -> Self {
        Self {
            provider: "offline".to_string(),
            intent_id: None,
            status: status
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "success".to_string()),
        }
    }

    pub fn cash() -> Self {
        Self {
            provider: "cash".to_string(),
            intent_id: Some(uuid::Uuid::new_v4().to_string()),
            status: "success".to_string(),
        }
    }
}

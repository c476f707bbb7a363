use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{EngineResult, RejectionReason};
use crate::model::{ItemId, SlotKey};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Booking request as it arrives from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    #[serde(alias = "passeio_id")]
    pub item_id: ItemId,
    pub customer_name: String,
    pub customer_email: String,
    pub booking_date: String,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// A booking request that passed validation and may enter the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBooking {
    pub key: SlotKey,
    pub customer_name: String,
    pub customer_email: String,
    pub quantity: i32,
}

impl BookingRequest {
    /// Missing or non-positive quantities are coerced to 1.
    pub fn validate(self) -> EngineResult<ValidatedBooking> {
        let date = parse_date(&self.booking_date)?;

        let customer_name = self.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(RejectionReason::InvalidInput(
                "customer_name is required".to_string(),
            ));
        }

        let customer_email = self.customer_email.trim().to_string();
        if !is_well_formed_email(&customer_email) {
            return Err(RejectionReason::InvalidInput(
                "customer_email is not a valid address".to_string(),
            ));
        }

        let quantity = match self.quantity {
            Some(q) if q >= 1 => i32::try_from(q).map_err(|_| {
                RejectionReason::InvalidInput("quantity is too large".to_string())
            })?,
            _ => 1,
        };

        Ok(ValidatedBooking {
            key: SlotKey::new(self.item_id, date),
            customer_name,
            customer_email,
            quantity,
        })
    }
}

pub fn parse_date(raw: &str) -> EngineResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        RejectionReason::InvalidInput("Invalid date format. Use YYYY-MM-DD.".to_string())
    })
}

pub fn is_well_formed_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

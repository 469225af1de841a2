use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::LedgerError;

/// A pallet intake record. Immutable once created; running availability is
/// always derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PalletSummary {
    pub id: i64,
    pub client_key: String,
    pub qty_received: i64,
    pub qty_available: i64,
    pub rec_date: NaiveDateTime,
    pub rec_user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct IntakeRequest {
    pub client_key: String,
    pub quantity: i64,
    pub user_id: String,
}

impl IntakeRequest {
    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_client(&self.client_key)?;
        validate_actor(&self.user_id)?;
        validate_quantity(self.quantity)
    }
}

#[derive(Debug, Serialize)]
pub struct IntakeResult {
    pub success: bool,
    pub pallet_id: i64,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub pallet_id: i64,
    pub qty_available: i64,
}

pub(crate) fn validate_client(client_key: &str) -> Result<(), LedgerError> {
    if client_key.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Client identifier must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_actor(user_id: &str) -> Result<(), LedgerError> {
    if user_id.trim().is_empty() {
        return Err(LedgerError::Validation(
            "User identifier must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_quantity(quantity: i64) -> Result<(), LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::Validation(
            "Quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(client_key: &str, quantity: i64, user_id: &str) -> IntakeRequest {
        IntakeRequest {
            client_key: client_key.to_string(),
            quantity,
            user_id: user_id.to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_intake() {
        assert!(request("ClientA", 100, "mgarcia").validate().is_ok());
    }

    #[test]
    fn rejects_blank_client() {
        let err = request("   ", 100, "mgarcia").validate().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn rejects_missing_actor() {
        let err = request("ClientA", 100, "").validate().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn rejects_non_positive_quantity() {
        assert!(request("ClientA", 0, "mgarcia").validate().is_err());
        assert!(request("ClientA", -5, "mgarcia").validate().is_err());
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::LedgerError;

/// Kind of an audit-trail entry. The persisted codes are the historical
/// Spanish movement names and are part of the stored data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Ingreso,
    CreacionTarea,
    TomaPosesion,
    DesbloqueoTarea,
    Descuento,
    DescuentoDirecto,
    CancelacionTarea,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Ingreso => "INGRESO",
            MovementKind::CreacionTarea => "CREACION_TAREA",
            MovementKind::TomaPosesion => "TOMA_POSESION",
            MovementKind::DesbloqueoTarea => "DESBLOQUEO_TAREA",
            MovementKind::Descuento => "DESCUENTO",
            MovementKind::DescuentoDirecto => "DESCUENTO_DIRECTO",
            MovementKind::CancelacionTarea => "CANCELACION_TAREA",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "INGRESO" => Some(MovementKind::Ingreso),
            "CREACION_TAREA" => Some(MovementKind::CreacionTarea),
            "TOMA_POSESION" => Some(MovementKind::TomaPosesion),
            "DESBLOQUEO_TAREA" => Some(MovementKind::DesbloqueoTarea),
            "DESCUENTO" => Some(MovementKind::Descuento),
            "DESCUENTO_DIRECTO" => Some(MovementKind::DescuentoDirecto),
            "CANCELACION_TAREA" => Some(MovementKind::CancelacionTarea),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit entry. Never mutated; removed only by the
/// administrative bulk purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub kind: MovementKind,
    pub pallet_id: Option<i64>,
    pub task_id: Option<i64>,
    pub discount_id: Option<i64>,
    pub client_key: String,
    pub qty: i64,
    pub aisle: Option<String>,
    pub rec_date: NaiveDateTime,
    pub rec_user_id: String,
}

/// Optional date window for movement queries. Bounds are inclusive calendar
/// days in the warehouse timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct MovementFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl MovementFilter {
    /// Parse `date_from`/`date_to` query values (ISO `YYYY-MM-DD`).
    pub fn from_params(
        date_from: Option<&str>,
        date_to: Option<&str>,
    ) -> Result<Self, LedgerError> {
        let parse = |label: &str, value: &str| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                LedgerError::Validation(format!("Invalid {label} date '{value}', expected YYYY-MM-DD"))
            })
        };
        let date_from = date_from.map(|v| parse("date_from", v)).transpose()?;
        let date_to = date_to.map(|v| parse("date_to", v)).transpose()?;
        if let (Some(from), Some(to)) = (date_from, date_to) {
            if from > to {
                return Err(LedgerError::Validation(
                    "date_from must not be after date_to".to_string(),
                ));
            }
        }
        Ok(Self { date_from, date_to })
    }

    /// Lower bound as a timestamp (start of day).
    pub fn lower_bound(&self) -> Option<NaiveDateTime> {
        self.date_from.map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
    }

    /// Exclusive upper bound as a timestamp (start of the day after
    /// `date_to`).
    pub fn upper_bound(&self) -> Option<NaiveDateTime> {
        self.date_to
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        let kinds = [
            MovementKind::Ingreso,
            MovementKind::CreacionTarea,
            MovementKind::TomaPosesion,
            MovementKind::DesbloqueoTarea,
            MovementKind::Descuento,
            MovementKind::DescuentoDirecto,
            MovementKind::CancelacionTarea,
        ];
        for kind in kinds {
            assert_eq!(MovementKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MovementKind::parse("TRASLADO"), None);
    }

    #[test]
    fn filter_parses_iso_dates() {
        let filter = MovementFilter::from_params(Some("2025-03-01"), Some("2025-03-31")).unwrap();
        assert_eq!(
            filter.lower_bound().unwrap().to_string(),
            "2025-03-01 00:00:00"
        );
        // Upper bound is exclusive: the whole of March 31 is included.
        assert_eq!(
            filter.upper_bound().unwrap().to_string(),
            "2025-04-01 00:00:00"
        );
    }

    #[test]
    fn filter_rejects_inverted_window() {
        let err = MovementFilter::from_params(Some("2025-04-01"), Some("2025-03-01")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn filter_rejects_malformed_dates() {
        assert!(MovementFilter::from_params(Some("01/03/2025"), None).is_err());
        assert!(MovementFilter::from_params(None, Some("not-a-date")).is_err());
    }
}

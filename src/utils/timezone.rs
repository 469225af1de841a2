use chrono::{DateTime, Utc};
use chrono_tz::{America::Argentina::Buenos_Aires, Tz};

/// Warehouse timezone constant
pub const WAREHOUSE_TZ: Tz = Buenos_Aires;

/// Get current time in the warehouse timezone
pub fn warehouse_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&WAREHOUSE_TZ)
}

/// Get current time in the warehouse timezone as RFC3339 string
pub fn warehouse_now_rfc3339() -> String {
    warehouse_now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;

    #[test]
    fn test_warehouse_timezone() {
        let warehouse_time = warehouse_now();

        // Buenos Aires is 3 hours behind UTC year-round
        let diff = warehouse_time.offset().fix().local_minus_utc();
        assert_eq!(diff, -3 * 3600);
    }

    #[test]
    fn test_rfc3339_format() {
        let rfc3339_string = warehouse_now_rfc3339();
        // Should be a valid RFC3339 string with timezone
        assert!(rfc3339_string.contains("-03:00"));
    }
}

use std::convert::TryInto;
use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::HttpResponse;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

pub const MAX_SUBJECT_NAME_BYTES: usize = 120;
pub const MAX_SUBJECT_CODE_BYTES: usize = 30;
pub const MAX_DISPLAY_NAME_BYTES: usize = 64;
pub const MAX_EMAIL_BYTES: usize = 128;

pub fn get_current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis().try_into().expect("Hello future")
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

pub fn message_response(message: &'static str) -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse { message })
}

/// Parses the wire date format, `YYYY-MM-DD`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Parses the wire time format, `HH:MM`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_iso_only() {
        assert_eq!(
            parse_date("2026-02-28"),
            NaiveDate::from_ymd_opt(2026, 2, 28)
        );
        assert_eq!(parse_date("28/02/2026"), None);
        assert_eq!(parse_date("2026-13-01"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn times_parse_hours_and_minutes_only() {
        assert_eq!(parse_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time("23:59"), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_time("24:00"), None);
        assert_eq!(parse_time("09:30:15"), None);
        assert_eq!(parse_time("half past nine"), None);
    }

    #[test]
    fn times_format_back_to_the_wire_shape() {
        let time = NaiveTime::from_hms_opt(7, 5, 0).unwrap();
        assert_eq!(format_time(time), "07:05");
    }
}

use std::io::Write;

use chrono::{NaiveDate, NaiveTime};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};

use crate::schema::{attendance_records, lectures, sessions, subjects, user_settings, users};

/// Weekday slot of a recurring lecture, stored as its lowercase name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    /// Parses a lowercase weekday name.
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "monday" => DayOfWeek::Monday,
            "tuesday" => DayOfWeek::Tuesday,
            "wednesday" => DayOfWeek::Wednesday,
            "thursday" => DayOfWeek::Thursday,
            "friday" => DayOfWeek::Friday,
            "saturday" => DayOfWeek::Saturday,
            "sunday" => DayOfWeek::Sunday,
            _ => return None,
        })
    }
}

impl ToSql<Text, Pg> for DayOfWeek {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for DayOfWeek {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = std::str::from_utf8(value.as_bytes())?;
        DayOfWeek::parse(raw).ok_or_else(|| format!("unrecognized weekday: {}", raw).into())
    }
}

/// Attendance outcome for one lecture slot. `Off` marks a day as
/// non-countable; it never contributes to attendance math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Off,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Off => "off",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "present" => AttendanceStatus::Present,
            "absent" => AttendanceStatus::Absent,
            "off" => AttendanceStatus::Off,
            _ => return None,
        })
    }
}

impl ToSql<Text, Pg> for AttendanceStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for AttendanceStatus {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = std::str::from_utf8(value.as_bytes())?;
        AttendanceStatus::parse(raw)
            .ok_or_else(|| format!("unrecognized attendance status: {}", raw).into())
    }
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub created_at: i64,
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = subjects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subject {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub code: String,
    pub created_at: i64,
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = lectures)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Lecture {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: i64,
    pub day: DayOfWeek,
    pub time: NaiveTime,
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = attendance_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: i64,
    pub date: NaiveDate,
    pub lecture_time: Option<NaiveTime>,
    pub status: AttendanceStatus,
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = user_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserSetting {
    pub id: i64,
    pub user_id: i64,
    pub target_percentage: i16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_parse_round_trips() {
        for day in [
            DayOfWeek::Monday,
            DayOfWeek::Tuesday,
            DayOfWeek::Wednesday,
            DayOfWeek::Thursday,
            DayOfWeek::Friday,
            DayOfWeek::Saturday,
            DayOfWeek::Sunday,
        ] {
            assert_eq!(DayOfWeek::parse(day.as_str()), Some(day));
        }
        assert_eq!(DayOfWeek::parse("Monday"), None);
        assert_eq!(DayOfWeek::parse("someday"), None);
        assert_eq!(DayOfWeek::parse(""), None);
    }

    #[test]
    fn status_parse_round_trips() {
        for status in [
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Off,
        ] {
            assert_eq!(AttendanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttendanceStatus::parse("late"), None);
        assert_eq!(AttendanceStatus::parse("PRESENT"), None);
    }

    #[test]
    fn enums_serialize_as_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&DayOfWeek::Wednesday).unwrap(),
            "\"wednesday\""
        );
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::Off).unwrap(),
            "\"off\""
        );
        let parsed: AttendanceStatus = serde_json::from_str("\"absent\"").unwrap();
        assert_eq!(parsed, AttendanceStatus::Absent);
    }
}

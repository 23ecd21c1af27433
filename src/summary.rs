//! Dashboard statistics derived from a user's attendance records.
//!
//! The computation is a pure function over an already-fetched snapshot of
//! records; it performs no I/O and cannot fail. Records with status `off`
//! mark a day as non-countable and are ignored by every count and
//! percentage.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::AttendanceStatus;

/// One attendance record as seen by the aggregator: the subject it counts
/// toward and its status. Loaded by joining records with subject names.
pub struct RecordSnapshot {
    pub subject_id: i64,
    pub subject_name: String,
    pub status: AttendanceStatus,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct OverallStats {
    pub total: u32,
    pub attended: u32,
    pub missed: u32,
    pub percentage: u8,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct SubjectStats {
    pub subject_id: i64,
    pub subject_name: String,
    pub present: u32,
    pub absent: u32,
    pub percentage: u8,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Summary {
    pub overall: OverallStats,
    pub subjects: Vec<SubjectStats>,
}

/// Rounds `attended / total` to a whole percentage. Exact halves round
/// away from zero, so 62.5% displays as 63. A zero denominator yields 0.
fn round_percentage(attended: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((f64::from(attended) / f64::from(total)) * 100.0).round() as u8
}

/// Computes the dashboard payload for one user's records.
///
/// Subjects appear in the output only when they have at least one counted
/// (present or absent) record, ordered by name ascending with ties broken
/// by subject id.
pub fn compute_summary(records: &[RecordSnapshot]) -> Summary {
    let mut attended = 0u32;
    let mut missed = 0u32;
    let mut by_subject: HashMap<i64, (&str, u32, u32)> = HashMap::new();

    for record in records {
        if record.status == AttendanceStatus::Off {
            continue;
        }
        let entry = by_subject
            .entry(record.subject_id)
            .or_insert((record.subject_name.as_str(), 0, 0));
        match record.status {
            AttendanceStatus::Present => {
                attended += 1;
                entry.1 += 1;
            }
            AttendanceStatus::Absent => {
                missed += 1;
                entry.2 += 1;
            }
            AttendanceStatus::Off => {}
        }
    }

    let mut subjects: Vec<SubjectStats> = by_subject
        .into_iter()
        .map(|(subject_id, (name, present, absent))| SubjectStats {
            subject_id,
            subject_name: name.to_owned(),
            present,
            absent,
            percentage: round_percentage(present, present + absent),
        })
        .collect();
    subjects.sort_by(|a, b| {
        a.subject_name
            .cmp(&b.subject_name)
            .then(a.subject_id.cmp(&b.subject_id))
    });

    let total = attended + missed;
    Summary {
        overall: OverallStats {
            total,
            attended,
            missed,
            percentage: round_percentage(attended, total),
        },
        subjects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(subject_id: i64, name: &str, status: AttendanceStatus) -> RecordSnapshot {
        RecordSnapshot {
            subject_id,
            subject_name: name.to_owned(),
            status,
        }
    }

    #[test]
    fn empty_input_yields_zeroed_summary() {
        let summary = compute_summary(&[]);
        assert_eq!(
            summary,
            Summary {
                overall: OverallStats {
                    total: 0,
                    attended: 0,
                    missed: 0,
                    percentage: 0,
                },
                subjects: vec![],
            }
        );
    }

    #[test]
    fn overall_counts_split_by_status() {
        let records = vec![
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(1, "Math", AttendanceStatus::Absent),
            snapshot(2, "Physics", AttendanceStatus::Absent),
            snapshot(2, "Physics", AttendanceStatus::Off),
        ];
        let summary = compute_summary(&records);
        assert_eq!(summary.overall.total, 4);
        assert_eq!(summary.overall.attended, 2);
        assert_eq!(summary.overall.missed, 2);
        assert_eq!(summary.overall.percentage, 50);

        assert_eq!(summary.subjects.len(), 2);
        let math = &summary.subjects[0];
        assert_eq!(math.subject_name, "Math");
        assert_eq!((math.present, math.absent, math.percentage), (2, 1, 67));
        let physics = &summary.subjects[1];
        assert_eq!(physics.subject_name, "Physics");
        assert_eq!((physics.present, physics.absent, physics.percentage), (0, 1, 0));
    }

    #[test]
    fn total_always_equals_attended_plus_missed() {
        let records = vec![
            snapshot(1, "A", AttendanceStatus::Present),
            snapshot(2, "B", AttendanceStatus::Absent),
            snapshot(3, "C", AttendanceStatus::Off),
            snapshot(1, "A", AttendanceStatus::Absent),
            snapshot(2, "B", AttendanceStatus::Present),
        ];
        let summary = compute_summary(&records);
        assert_eq!(
            summary.overall.total,
            summary.overall.attended + summary.overall.missed
        );
    }

    #[test]
    fn off_records_never_affect_any_count() {
        let with_off = vec![
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(1, "Math", AttendanceStatus::Off),
            snapshot(1, "Math", AttendanceStatus::Off),
            snapshot(1, "Math", AttendanceStatus::Absent),
        ];
        let without_off = vec![
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(1, "Math", AttendanceStatus::Absent),
        ];
        assert_eq!(compute_summary(&with_off), compute_summary(&without_off));
    }

    #[test]
    fn subject_with_only_off_records_is_omitted() {
        let records = vec![
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(2, "Yoga", AttendanceStatus::Off),
            snapshot(2, "Yoga", AttendanceStatus::Off),
        ];
        let summary = compute_summary(&records);
        assert_eq!(summary.subjects.len(), 1);
        assert_eq!(summary.subjects[0].subject_name, "Math");
    }

    #[test]
    fn thirds_round_to_nearest() {
        let records = vec![
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(1, "Math", AttendanceStatus::Absent),
            snapshot(1, "Math", AttendanceStatus::Absent),
        ];
        // 1/3 of lectures attended.
        assert_eq!(compute_summary(&records).overall.percentage, 33);

        let records = vec![
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(1, "Math", AttendanceStatus::Absent),
        ];
        // 2/3 of lectures attended.
        assert_eq!(compute_summary(&records).overall.percentage, 67);
    }

    #[test]
    fn exact_halves_round_up() {
        // 5/8 = 62.5% -> 63
        let mut records = Vec::new();
        for _ in 0..5 {
            records.push(snapshot(1, "Math", AttendanceStatus::Present));
        }
        for _ in 0..3 {
            records.push(snapshot(1, "Math", AttendanceStatus::Absent));
        }
        assert_eq!(compute_summary(&records).overall.percentage, 63);

        // 1/8 = 12.5% -> 13
        let mut records = Vec::new();
        records.push(snapshot(1, "Math", AttendanceStatus::Present));
        for _ in 0..7 {
            records.push(snapshot(1, "Math", AttendanceStatus::Absent));
        }
        assert_eq!(compute_summary(&records).overall.percentage, 13);
    }

    #[test]
    fn percentages_stay_within_bounds() {
        let all_present = vec![
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(1, "Math", AttendanceStatus::Present),
        ];
        assert_eq!(compute_summary(&all_present).overall.percentage, 100);

        let all_absent = vec![
            snapshot(1, "Math", AttendanceStatus::Absent),
            snapshot(1, "Math", AttendanceStatus::Absent),
        ];
        assert_eq!(compute_summary(&all_absent).overall.percentage, 0);
    }

    #[test]
    fn subjects_sorted_by_name_then_id() {
        let records = vec![
            snapshot(3, "Chemistry", AttendanceStatus::Present),
            snapshot(1, "Biology", AttendanceStatus::Present),
            snapshot(4, "Biology", AttendanceStatus::Absent),
        ];
        let summary = compute_summary(&records);
        let order: Vec<(i64, &str)> = summary
            .subjects
            .iter()
            .map(|s| (s.subject_id, s.subject_name.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "Biology"), (4, "Biology"), (3, "Chemistry")]);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let records = vec![
            snapshot(1, "Math", AttendanceStatus::Present),
            snapshot(2, "Physics", AttendanceStatus::Absent),
            snapshot(2, "Physics", AttendanceStatus::Off),
        ];
        assert_eq!(compute_summary(&records), compute_summary(&records));
    }

    #[test]
    fn serializes_to_dashboard_shape() {
        let records = vec![
            snapshot(7, "Math", AttendanceStatus::Present),
            snapshot(7, "Math", AttendanceStatus::Absent),
        ];
        let value = serde_json::to_value(compute_summary(&records)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "overall": {"total": 2, "attended": 1, "missed": 1, "percentage": 50},
                "subjects": [
                    {"subject_id": 7, "subject_name": "Math", "present": 1, "absent": 1, "percentage": 50}
                ]
            })
        );
    }
}

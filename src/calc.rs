use crate::model::{AcademyData, AttendanceStatus, PaymentRecord};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

/// Grace window: payments through this day of the month carry no surcharge.
pub const ON_TIME_CUTOFF_DAY: u32 = 7;
pub const WEEK_TWO_CUTOFF_DAY: u32 = 14;
pub const WEEK_TWO_SURCHARGE: f64 = 30.0;
pub const WEEK_THREE_SURCHARGE: f64 = 90.0;

/// Active students unpaid past this day of the month go inactive.
pub const DEACTIVATION_CUTOFF_DAY: u32 = 21;

/// Late-fee bracket by day-of-month at the moment of marking paid.
pub fn surcharge_for_day(day: u32) -> f64 {
    if day <= ON_TIME_CUTOFF_DAY {
        0.0
    } else if day <= WEEK_TWO_CUTOFF_DAY {
        WEEK_TWO_SURCHARGE
    } else {
        WEEK_THREE_SURCHARGE
    }
}

pub fn surcharge_label(day: u32) -> &'static str {
    if day <= ON_TIME_CUTOFF_DAY {
        "on time"
    } else if day <= WEEK_TWO_CUTOFF_DAY {
        "week 2 (+30)"
    } else {
        "week 3+ (+90)"
    }
}

pub fn total_due(monthly_fee: f64, day: u32) -> f64 {
    monthly_fee + surcharge_for_day(day)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceTally {
    pub presents: usize,
    pub lates: usize,
    pub absents: usize,
    pub justifieds: usize,
}

pub fn attendance_tally(data: &AcademyData, student_id: &str) -> AttendanceTally {
    let mut tally = AttendanceTally::default();
    for record in data.attendance.iter().filter(|r| r.student_id == student_id) {
        match record.status {
            AttendanceStatus::Present => tally.presents += 1,
            AttendanceStatus::Late => tally.lates += 1,
            AttendanceStatus::Absent => tally.absents += 1,
            AttendanceStatus::Justified => tally.justifieds += 1,
        }
    }
    tally
}

/// Weighted attendance quality plus a punctuality bonus for the current
/// month's payment: 50 when paid without surcharge, 20 when paid late,
/// 0 when unpaid.
pub fn engagement_score(tally: &AttendanceTally, current_payment: Option<&PaymentRecord>) -> i64 {
    let attendance = 10 * tally.presents as i64 + 5 * tally.lates as i64
        + 3 * tally.justifieds as i64
        - 10 * tally.absents as i64;
    let punctuality = match current_payment {
        Some(p) if p.surcharge == 0.0 => 50,
        Some(_) => 20,
        None => 0,
    };
    attendance + punctuality
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student_id: String,
    pub display_name: String,
    pub total_score: i64,
    pub active: bool,
}

/// Full re-ranked snapshot, descending by score. The sort is stable, so
/// equal scores keep roster order.
pub fn rank_students(data: &AcademyData, today: NaiveDate) -> Vec<RankedStudent> {
    let month = today.month();
    let year = today.year();
    let mut rows: Vec<RankedStudent> = data
        .students
        .iter()
        .map(|s| {
            let tally = attendance_tally(data, &s.id);
            let payment = data.payment_for(&s.id, month, year);
            RankedStudent {
                student_id: s.id.clone(),
                display_name: s.display_name(),
                total_score: engagement_score(&tally, payment),
                active: s.active,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    rows
}

/// Past the cutoff, deactivates active students without a payment record
/// for the current month/year. Idempotent, and scoped to the current
/// month only; prior months are never revisited. Returns how many
/// students were deactivated.
pub fn deactivation_sweep(data: &mut AcademyData, today: NaiveDate) -> usize {
    if today.day() <= DEACTIVATION_CUTOFF_DAY {
        return 0;
    }
    let month = today.month();
    let year = today.year();
    let paid: HashSet<String> = data
        .payments
        .iter()
        .filter(|p| p.month == month && p.year == year)
        .map(|p| p.student_id.clone())
        .collect();

    let mut changed = 0;
    for student in &mut data.students {
        if student.active && !paid.contains(&student.id) {
            student.active = false;
            changed += 1;
        }
    }
    changed
}

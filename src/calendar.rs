//! Attendance calendar reconciliation.
//!
//! Stored attendance rows only exist for days somebody checked in, was marked
//! by an admin, or had leave/WFH approved. Everything else on a calendar is
//! derived here: holidays and weekly offs are overlaid, past working days
//! without a row become absences, and the result is aggregated per month.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::holiday::Holiday;

/// Longest range a single calendar or report request may span
pub const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Present,
    Absent,
    Leave,
    Wfh,
    Holiday,
    WeekOff,
}

impl From<AttendanceStatus> for DayStatus {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::Present => DayStatus::Present,
            AttendanceStatus::Absent => DayStatus::Absent,
            AttendanceStatus::Leave => DayStatus::Leave,
            AttendanceStatus::Wfh => DayStatus::Wfh,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CalendarDay {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// `None` for days that are still open (today, future, before joining)
    pub status: Option<DayStatus>,
    #[schema(value_type = Option<String>)]
    pub in_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>)]
    pub out_time: Option<NaiveDateTime>,
    pub worked_hours: Option<f64>,
    pub attendance_id: Option<u64>,
    /// Set whenever an applicable holiday falls on this date, even if worked
    pub holiday_name: Option<String>,
    pub week_off: bool,
}

/// Inclusive iterator over calendar days; empty when `from > to`.
#[derive(Debug, Clone)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            next: (from <= to).then_some(from),
            end: to,
        }
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = current.succ_opt().filter(|d| *d <= self.end);
        Some(current)
    }
}

/// Sundays and the 2nd/4th Saturday of each month
pub fn is_week_off(date: NaiveDate) -> bool {
    match date.weekday() {
        Weekday::Sun => true,
        Weekday::Sat => matches!((date.day() - 1) / 7 + 1, 2 | 4),
        _ => false,
    }
}

pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), ApiError> {
    if from > to {
        return Err(ApiError::BadRequest("from must not be after to".into()));
    }
    if (to - from).num_days() >= MAX_RANGE_DAYS {
        return Err(ApiError::BadRequest(format!(
            "date range must not exceed {MAX_RANGE_DAYS} days"
        )));
    }
    Ok(())
}

/// Merge stored rows with holidays and weekly offs, one entry per day.
///
/// Precedence per day: stored record, applicable holiday, weekly off, then
/// blank before `joined_on`, absent before `today`, blank otherwise.
pub fn reconcile(
    from: NaiveDate,
    to: NaiveDate,
    records: &[Attendance],
    holidays: &[Holiday],
    today: NaiveDate,
    joined_on: Option<NaiveDate>,
) -> Vec<CalendarDay> {
    let by_date: HashMap<NaiveDate, &Attendance> = records.iter().map(|r| (r.date, r)).collect();
    let holiday_names: HashMap<NaiveDate, &str> = holidays
        .iter()
        .filter(|h| h.applicable)
        .map(|h| (h.date, h.name.as_str()))
        .collect();

    DateRange::new(from, to)
        .map(|date| {
            let holiday_name = holiday_names.get(&date).map(|name| name.to_string());
            let week_off = is_week_off(date);

            if let Some(record) = by_date.get(&date) {
                return CalendarDay {
                    date,
                    status: Some(record.status.into()),
                    in_time: record.in_time,
                    out_time: record.out_time,
                    worked_hours: record.worked_hours,
                    attendance_id: Some(record.id),
                    holiday_name,
                    week_off,
                };
            }

            let status = if holiday_name.is_some() {
                Some(DayStatus::Holiday)
            } else if week_off {
                Some(DayStatus::WeekOff)
            } else if joined_on.is_some_and(|joined| date < joined) {
                None
            } else if date < today {
                Some(DayStatus::Absent)
            } else {
                None
            };

            CalendarDay {
                date,
                status,
                in_time: None,
                out_time: None,
                worked_hours: None,
                attendance_id: None,
                holiday_name,
                week_off,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub total_days: u32,
    /// Days that are neither a holiday nor a weekly off
    pub working_days: u32,
    pub present: u32,
    pub absent: u32,
    pub leave: u32,
    pub wfh: u32,
    pub holiday: u32,
    pub week_off: u32,
    pub unmarked: u32,
    pub worked_hours: f64,
}

pub fn summarize(days: &[CalendarDay]) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();
    let mut hours = 0.0;

    for day in days {
        summary.total_days += 1;
        if day.holiday_name.is_none() && !day.week_off {
            summary.working_days += 1;
        }
        match day.status {
            Some(DayStatus::Present) => summary.present += 1,
            Some(DayStatus::Absent) => summary.absent += 1,
            Some(DayStatus::Leave) => summary.leave += 1,
            Some(DayStatus::Wfh) => summary.wfh += 1,
            Some(DayStatus::Holiday) => summary.holiday += 1,
            Some(DayStatus::WeekOff) => summary.week_off += 1,
            None => summary.unmarked += 1,
        }
        hours += day.worked_hours.unwrap_or(0.0);
    }

    summary.worked_hours = round2(hours);
    summary
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct MonthBucket {
    #[schema(example = 3)]
    pub month: u32,
    pub present: u32,
    pub absent: u32,
    pub leave: u32,
    pub wfh: u32,
}

/// Company-wide counts of stored statuses per month of `year`
pub fn bucket_by_month(year: i32, rows: &[(NaiveDate, AttendanceStatus)]) -> Vec<MonthBucket> {
    let mut buckets: Vec<MonthBucket> = (1..=12)
        .map(|month| MonthBucket {
            month,
            ..Default::default()
        })
        .collect();

    for (date, status) in rows.iter().filter(|(date, _)| date.year() == year) {
        let bucket = &mut buckets[date.month0() as usize];
        match status {
            AttendanceStatus::Present => bucket.present += 1,
            AttendanceStatus::Absent => bucket.absent += 1,
            AttendanceStatus::Leave => bucket.leave += 1,
            AttendanceStatus::Wfh => bucket.wfh += 1,
        }
    }

    buckets
}

/// Days in range that are neither an applicable holiday nor a weekly off
pub fn working_days(from: NaiveDate, to: NaiveDate, holidays: &[Holiday]) -> Vec<NaiveDate> {
    DateRange::new(from, to)
        .filter(|date| !is_week_off(*date))
        .filter(|date| !holidays.iter().any(|h| h.applicable && h.date == *date))
        .collect()
}

pub fn worked_hours(in_time: NaiveDateTime, out_time: NaiveDateTime) -> f64 {
    let seconds = (out_time - in_time).num_seconds().max(0);
    round2(seconds as f64 / 3600.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Parses `YYYY-MM`
pub fn parse_month(raw: &str) -> Option<(i32, u32)> {
    let (year, month) = raw.trim().split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(id: u64, date: &str, status: AttendanceStatus, hours: Option<f64>) -> Attendance {
        Attendance {
            id,
            user_id: 1,
            date: d(date),
            in_time: hours.map(|_| d(date).and_hms_opt(9, 0, 0).unwrap()),
            out_time: None,
            worked_hours: hours,
            status,
            check_in_latitude: None,
            check_in_longitude: None,
            check_in_address: None,
            check_out_latitude: None,
            check_out_longitude: None,
            note: None,
        }
    }

    fn holiday(date: &str, name: &str, applicable: bool) -> Holiday {
        Holiday {
            id: 1,
            date: d(date),
            name: name.to_string(),
            applicable,
        }
    }

    #[test]
    fn sundays_and_second_fourth_saturdays_are_off() {
        assert!(is_week_off(d("2026-03-01"))); // Sunday
        assert!(!is_week_off(d("2026-03-07"))); // 1st Saturday
        assert!(is_week_off(d("2026-03-14"))); // 2nd Saturday
        assert!(!is_week_off(d("2026-03-21"))); // 3rd Saturday
        assert!(is_week_off(d("2026-03-28"))); // 4th Saturday
        assert!(!is_week_off(d("2026-01-31"))); // 5th Saturday
        assert!(!is_week_off(d("2026-03-02"))); // Monday
    }

    #[test]
    fn date_range_is_inclusive_and_empty_when_reversed() {
        let days: Vec<_> = DateRange::new(d("2026-02-27"), d("2026-03-02")).collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days[1], d("2026-02-28"));
        assert_eq!(DateRange::new(d("2026-03-02"), d("2026-03-01")).count(), 0);
        assert_eq!(DateRange::new(d("2026-03-02"), d("2026-03-02")).count(), 1);
    }

    #[test]
    fn holiday_overrides_week_off_which_overrides_blank() {
        // 2026-03-14 is both the 2nd Saturday and a holiday
        let holidays = [holiday("2026-03-14", "Festival", true)];
        let days = reconcile(d("2026-03-13"), d("2026-03-16"), &[], &holidays, d("2026-03-01"), None);

        assert_eq!(days[0].status, None); // Friday in the future
        assert_eq!(days[1].status, Some(DayStatus::Holiday));
        assert_eq!(days[1].holiday_name.as_deref(), Some("Festival"));
        assert!(days[1].week_off);
        assert_eq!(days[2].status, Some(DayStatus::WeekOff)); // Sunday
        assert_eq!(days[3].status, None); // Monday in the future
    }

    #[test]
    fn stored_record_wins_over_holiday() {
        let holidays = [holiday("2026-03-05", "Founders Day", true)];
        let records = [record(9, "2026-03-05", AttendanceStatus::Present, Some(4.5))];
        let days = reconcile(d("2026-03-05"), d("2026-03-05"), &records, &holidays, d("2026-03-10"), None);

        assert_eq!(days[0].status, Some(DayStatus::Present));
        assert_eq!(days[0].attendance_id, Some(9));
        assert_eq!(days[0].holiday_name.as_deref(), Some("Founders Day"));
    }

    #[test]
    fn non_applicable_holiday_does_not_mark_the_day() {
        let holidays = [holiday("2026-03-05", "Optional", false)];
        let days = reconcile(d("2026-03-05"), d("2026-03-05"), &[], &holidays, d("2026-03-10"), None);
        assert_eq!(days[0].status, Some(DayStatus::Absent));
        assert!(days[0].holiday_name.is_none());
    }

    #[test]
    fn past_working_days_without_record_are_absent_unless_before_joining() {
        let days = reconcile(
            d("2026-03-02"),
            d("2026-03-05"),
            &[],
            &[],
            d("2026-03-05"),
            Some(d("2026-03-03")),
        );
        assert_eq!(days[0].status, None); // before joining
        assert_eq!(days[1].status, Some(DayStatus::Absent));
        assert_eq!(days[2].status, Some(DayStatus::Absent));
        assert_eq!(days[3].status, None); // today stays open
    }

    #[test]
    fn summary_counts_a_full_month() {
        let (from, to) = month_bounds(2026, 3).unwrap();
        let records = [
            record(1, "2026-03-02", AttendanceStatus::Present, Some(8.25)),
            record(2, "2026-03-03", AttendanceStatus::Wfh, Some(7.5)),
            record(3, "2026-03-04", AttendanceStatus::Leave, None),
        ];
        let holidays = [holiday("2026-03-06", "Holi", true)];
        let days = reconcile(from, to, &records, &holidays, d("2026-04-01"), None);
        let summary = summarize(&days);

        assert_eq!(summary.total_days, 31);
        // 5 Sundays, 2 off Saturdays and one holiday
        assert_eq!(summary.week_off, 7);
        assert_eq!(summary.holiday, 1);
        assert_eq!(summary.working_days, 23);
        assert_eq!(summary.present, 1);
        assert_eq!(summary.wfh, 1);
        assert_eq!(summary.leave, 1);
        assert_eq!(summary.absent, 20);
        assert_eq!(summary.unmarked, 0);
        assert_eq!(summary.worked_hours, 15.75);
    }

    #[test]
    fn buckets_group_by_month_and_ignore_other_years() {
        let rows = [
            (d("2026-01-05"), AttendanceStatus::Present),
            (d("2026-01-06"), AttendanceStatus::Present),
            (d("2026-03-09"), AttendanceStatus::Wfh),
            (d("2026-12-31"), AttendanceStatus::Leave),
            (d("2025-12-31"), AttendanceStatus::Absent),
        ];
        let buckets = bucket_by_month(2026, &rows);

        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets[0].present, 2);
        assert_eq!(buckets[2].wfh, 1);
        assert_eq!(buckets[11].leave, 1);
        assert_eq!(buckets.iter().map(|b| b.absent).sum::<u32>(), 0);
    }

    #[test]
    fn working_days_skip_weekends_and_applicable_holidays() {
        let holidays = [
            holiday("2026-03-04", "Holiday", true),
            holiday("2026-03-05", "Optional", false),
        ];
        let days = working_days(d("2026-03-01"), d("2026-03-08"), &holidays);
        assert_eq!(
            days,
            vec![
                d("2026-03-02"),
                d("2026-03-03"),
                d("2026-03-05"),
                d("2026-03-06"),
                d("2026-03-07"),
            ]
        );
    }

    #[test]
    fn worked_hours_are_rounded_and_never_negative() {
        let base = d("2026-03-02");
        let in_time = base.and_hms_opt(9, 10, 0).unwrap();
        let out_time = base.and_hms_opt(17, 30, 0).unwrap();
        assert_eq!(worked_hours(in_time, out_time), 8.33);
        assert_eq!(worked_hours(out_time, in_time), 0.0);
    }

    #[test]
    fn month_helpers() {
        assert_eq!(parse_month("2026-02"), Some((2026, 2)));
        assert_eq!(parse_month("2026-13"), None);
        assert_eq!(parse_month("march"), None);
        assert_eq!(month_bounds(2026, 2), Some((d("2026-02-01"), d("2026-02-28"))));
        assert_eq!(month_bounds(2026, 12), Some((d("2026-12-01"), d("2026-12-31"))));
    }

    #[test]
    fn range_validation() {
        assert!(validate_range(d("2026-01-01"), d("2026-12-31")).is_ok());
        assert!(validate_range(d("2026-01-02"), d("2026-01-01")).is_err());
        assert!(validate_range(d("2026-01-01"), d("2027-01-02")).is_err());
    }
}

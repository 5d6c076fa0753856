//! Daily time record metrics against an official schedule.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub time_in: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub time_out: NaiveTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayPunches {
    pub time_in: Option<NaiveTime>,
    pub break_in: Option<NaiveTime>,
    pub break_out: Option<NaiveTime>,
    pub time_out: Option<NaiveTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayMetrics {
    pub present: bool,
    pub absent: bool,
    pub rendered: i64,
    pub late: i64,
    pub undertime: i64,
    pub overtime: i64,
}

impl DayMetrics {
    pub fn tardiness(&self) -> i64 {
        self.late + self.undertime
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodTotals {
    pub days_present: i32,
    pub days_absent: i32,
    pub rendered: i64,
    pub late: i64,
    pub undertime: i64,
    pub tardiness: i64,
    pub overtime: i64,
}

fn minutes(from: NaiveTime, to: NaiveTime) -> i64 {
    (to - from).num_minutes()
}

fn positive(from: Option<NaiveTime>, to: Option<NaiveTime>) -> i64 {
    match (from, to) {
        (Some(a), Some(b)) => minutes(a, b).max(0),
        _ => 0,
    }
}

impl Schedule {
    pub fn scheduled_minutes(&self) -> i64 {
        match (self.break_start, self.break_end) {
            (Some(bs), Some(be)) => {
                minutes(self.time_in, bs).max(0) + minutes(be, self.time_out).max(0)
            }
            _ => minutes(self.time_in, self.time_out).max(0),
        }
    }
}

/// Worked minutes with the break taken out when both break punches exist.
fn worked_minutes(p: &DayPunches) -> i64 {
    let (Some(time_in), Some(time_out)) = (p.time_in, p.time_out) else {
        return 0;
    };
    let total = minutes(time_in, time_out).max(0);
    (total - positive(p.break_in, p.break_out)).max(0)
}

pub fn day_metrics(schedule: Option<&Schedule>, punches: &DayPunches) -> DayMetrics {
    let Some(s) = schedule else {
        // rest day: anything worked is overtime
        return DayMetrics {
            overtime: worked_minutes(punches),
            ..Default::default()
        };
    };

    let (Some(time_in), Some(time_out)) = (punches.time_in, punches.time_out) else {
        return DayMetrics {
            absent: true,
            ..Default::default()
        };
    };

    let late = minutes(s.time_in, time_in).max(0) + positive(s.break_end, punches.break_out);
    let undertime = minutes(time_out, s.time_out).max(0) + positive(punches.break_in, s.break_start);
    let overtime = minutes(s.time_out, time_out).max(0);
    let rendered = (s.scheduled_minutes() - late - undertime).max(0);

    DayMetrics {
        present: true,
        absent: false,
        rendered,
        late,
        undertime,
        overtime,
    }
}

/// Walks every date in `[start, end]`. Scheduled days without a record are absences.
pub fn period_totals(
    start: NaiveDate,
    end: NaiveDate,
    schedules: &HashMap<Weekday, Schedule>,
    records: &HashMap<NaiveDate, DayPunches>,
) -> PeriodTotals {
    let mut totals = PeriodTotals::default();
    let empty = DayPunches::default();

    for date in start.iter_days().take_while(|d| *d <= end) {
        let schedule = schedules.get(&date.weekday());
        let punches = records.get(&date).unwrap_or(&empty);
        if schedule.is_none() && punches == &empty {
            continue;
        }

        let m = day_metrics(schedule, punches);
        if m.present {
            totals.days_present += 1;
        }
        if m.absent {
            totals.days_absent += 1;
        }
        totals.rendered += m.rendered;
        totals.late += m.late;
        totals.undertime += m.undertime;
        totals.tardiness += m.tardiness();
        totals.overtime += m.overtime;
    }

    totals
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Accepts full or abbreviated English day names in any case.
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    s.trim().parse::<Weekday>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn regular() -> Schedule {
        Schedule {
            time_in: t(8, 0),
            break_start: Some(t(12, 0)),
            break_end: Some(t(13, 0)),
            time_out: t(17, 0),
        }
    }

    fn full_day(time_in: NaiveTime, time_out: NaiveTime) -> DayPunches {
        DayPunches {
            time_in: Some(time_in),
            break_in: Some(t(12, 0)),
            break_out: Some(t(13, 0)),
            time_out: Some(time_out),
        }
    }

    #[test]
    fn on_time_day_renders_full_schedule() {
        let m = day_metrics(Some(&regular()), &full_day(t(8, 0), t(17, 0)));
        assert!(m.present);
        assert_eq!(m.rendered, 480);
        assert_eq!(m.tardiness(), 0);
        assert_eq!(m.overtime, 0);
    }

    #[test]
    fn late_and_early_out_count_as_tardiness() {
        let m = day_metrics(Some(&regular()), &full_day(t(8, 15), t(16, 30)));
        assert_eq!(m.late, 15);
        assert_eq!(m.undertime, 30);
        assert_eq!(m.tardiness(), 45);
        assert_eq!(m.rendered, 435);
    }

    #[test]
    fn long_break_is_late_return() {
        let mut p = full_day(t(8, 0), t(17, 0));
        p.break_in = Some(t(11, 50));
        p.break_out = Some(t(13, 20));
        let m = day_metrics(Some(&regular()), &p);
        assert_eq!(m.late, 20);
        assert_eq!(m.undertime, 10);
    }

    #[test]
    fn staying_late_is_overtime() {
        let m = day_metrics(Some(&regular()), &full_day(t(7, 45), t(18, 30)));
        assert_eq!(m.overtime, 90);
        assert_eq!(m.late, 0);
        assert_eq!(m.rendered, 480);
    }

    #[test]
    fn missing_time_out_is_absent() {
        let p = DayPunches {
            time_in: Some(t(8, 0)),
            ..Default::default()
        };
        let m = day_metrics(Some(&regular()), &p);
        assert!(m.absent);
        assert!(!m.present);
        assert_eq!(m.rendered, 0);
    }

    #[test]
    fn rest_day_work_is_overtime_only() {
        let m = day_metrics(None, &full_day(t(8, 0), t(12, 0)));
        assert!(!m.absent);
        assert!(!m.present);
        // four hours on the clock less the recorded one-hour break
        assert_eq!(m.overtime, 180);
    }

    #[test]
    fn period_counts_unrecorded_scheduled_days_as_absent() {
        let mut schedules = HashMap::new();
        for d in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            schedules.insert(d, regular());
        }
        // 2024-03-04 is a Monday
        let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let mut records = HashMap::new();
        records.insert(start, full_day(t(8, 10), t(17, 0)));
        records.insert(start.succ_opt().unwrap(), full_day(t(8, 0), t(17, 0)));

        let totals = period_totals(start, end, &schedules, &records);
        assert_eq!(totals.days_present, 2);
        assert_eq!(totals.days_absent, 3);
        assert_eq!(totals.late, 10);
        assert_eq!(totals.tardiness, 10);
        assert_eq!(totals.rendered, 950);
    }

    #[test]
    fn weekday_names_round_trip() {
        for d in [Weekday::Mon, Weekday::Sat, Weekday::Sun] {
            assert_eq!(parse_weekday(weekday_name(d)), Some(d));
        }
        assert_eq!(parse_weekday("friday"), Some(Weekday::Fri));
        assert_eq!(parse_weekday("someday"), None);
    }
}

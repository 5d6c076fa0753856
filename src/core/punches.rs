//! Turns raw device punches into day records.

use crate::core::dtr::DayPunches;
use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeMap;

/// Punches closer than this to the previous kept punch are treated as repeats.
const REPEAT_WINDOW_MINUTES: i64 = 1;

/// First punch is time in, last is time out. With four or more distinct
/// punches the second and third become break in and break out.
pub fn compile_day(punches: &[NaiveTime]) -> DayPunches {
    let mut sorted = punches.to_vec();
    sorted.sort();

    let mut distinct: Vec<NaiveTime> = Vec::with_capacity(sorted.len());
    for p in sorted {
        match distinct.last() {
            Some(last) if (p - *last).num_minutes() < REPEAT_WINDOW_MINUTES => {}
            _ => distinct.push(p),
        }
    }

    match distinct.as_slice() {
        [] => DayPunches::default(),
        [only] => DayPunches {
            time_in: Some(*only),
            ..Default::default()
        },
        [first, .., last] if distinct.len() < 4 => DayPunches {
            time_in: Some(*first),
            time_out: Some(*last),
            ..Default::default()
        },
        [first, second, third, .., last] => DayPunches {
            time_in: Some(*first),
            break_in: Some(*second),
            break_out: Some(*third),
            time_out: Some(*last),
        },
        _ => DayPunches::default(),
    }
}

/// Groups `(person, date, time)` punches and compiles each day.
pub fn compile_punches<I>(punches: I) -> BTreeMap<(String, NaiveDate), DayPunches>
where
    I: IntoIterator<Item = (String, NaiveDate, NaiveTime)>,
{
    let mut grouped: BTreeMap<(String, NaiveDate), Vec<NaiveTime>> = BTreeMap::new();
    for (person, date, time) in punches {
        grouped.entry((person, date)).or_default().push(time);
    }

    grouped
        .into_iter()
        .map(|(key, times)| (key, compile_day(&times)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn single_punch_is_time_in_only() {
        let d = compile_day(&[t(8, 1, 0)]);
        assert_eq!(d.time_in, Some(t(8, 1, 0)));
        assert_eq!(d.time_out, None);
    }

    #[test]
    fn two_punches_are_in_and_out() {
        let d = compile_day(&[t(17, 2, 0), t(7, 55, 0)]);
        assert_eq!(d.time_in, Some(t(7, 55, 0)));
        assert_eq!(d.time_out, Some(t(17, 2, 0)));
        assert_eq!(d.break_in, None);
    }

    #[test]
    fn four_punches_fill_breaks() {
        let d = compile_day(&[t(8, 0, 0), t(12, 1, 0), t(12, 58, 0), t(17, 0, 0)]);
        assert_eq!(d.break_in, Some(t(12, 1, 0)));
        assert_eq!(d.break_out, Some(t(12, 58, 0)));
        assert_eq!(d.time_out, Some(t(17, 0, 0)));
    }

    #[test]
    fn repeated_taps_collapse() {
        // device double-read within the same minute
        let d = compile_day(&[t(8, 0, 0), t(8, 0, 20), t(17, 0, 0), t(17, 0, 5)]);
        assert_eq!(d.time_in, Some(t(8, 0, 0)));
        assert_eq!(d.time_out, Some(t(17, 0, 0)));
        assert_eq!(d.break_in, None);
    }

    #[test]
    fn groups_by_person_and_date() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let compiled = compile_punches(vec![
            ("A".to_string(), day, t(8, 0, 0)),
            ("B".to_string(), day, t(9, 0, 0)),
            ("A".to_string(), day, t(17, 0, 0)),
        ]);
        assert_eq!(compiled.len(), 2);
        assert_eq!(
            compiled[&("A".to_string(), day)].time_out,
            Some(t(17, 0, 0))
        );
        assert_eq!(compiled[&("B".to_string(), day)].time_out, None);
    }
}

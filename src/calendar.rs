// src/calendar.rs
use chrono::{Datelike, Days, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

pub const DAYS_PER_WEEK: usize = 7;

// Wider than the whole representable date range.
const MAX_SHIFT_DAYS: u64 = 400_000_000;

/// First day of a displayed week.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl From<WeekStart> for Weekday {
    fn from(value: WeekStart) -> Self {
        match value {
            WeekStart::Sunday => Self::Sun,
            WeekStart::Monday => Self::Mon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekDirection {
    Previous,
    Next,
}

impl WeekDirection {
    const fn weeks(self) -> i64 {
        match self {
            Self::Previous => -1,
            Self::Next => 1,
        }
    }
}

/// Days on which at least one session was completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSet {
    dates: HashSet<NaiveDate>,
}

impl CompletionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `date`. Returns `false` if the day was already recorded.
    pub fn insert(&mut self, date: NaiveDate) -> bool {
        self.dates.insert(date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl FromIterator<NaiveDate> for CompletionSet {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

/// Earliest and latest anchors whose whole week is a valid date range.
pub fn anchor_bounds() -> (NaiveDate, NaiveDate) {
    let margin = Days::new(DAYS_PER_WEEK as u64 - 1);
    (
        NaiveDate::MIN.checked_add_days(margin).unwrap_or(NaiveDate::MIN),
        NaiveDate::MAX.checked_sub_days(margin).unwrap_or(NaiveDate::MAX),
    )
}

fn clamp_anchor(date: NaiveDate) -> NaiveDate {
    let (lowest, highest) = anchor_bounds();
    date.clamp(lowest, highest)
}

/// Returns the seven consecutive days of the week containing `anchor`,
/// starting on `week_start`. Anchors at the very edge of the date range
/// use the nearest complete week.
pub fn select_week(anchor: NaiveDate, week_start: WeekStart) -> [NaiveDate; DAYS_PER_WEEK] {
    let anchor = clamp_anchor(anchor);
    let start_day = Weekday::from(week_start);
    let offset = (anchor.weekday().num_days_from_monday() + 7
        - start_day.num_days_from_monday())
        % 7;
    let first = anchor - Duration::days(i64::from(offset));
    std::array::from_fn(|i| first + Duration::days(i as i64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub completed: bool,
    pub selected: bool,
}

impl CalendarDay {
    /// Short weekday name, e.g. "Tue".
    pub fn weekday_label(&self) -> String {
        self.date.format("%a").to_string()
    }
}

/// A navigable seven-day window anchored on the selected date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarStrip {
    anchor: NaiveDate,
    week_start: WeekStart,
}

impl CalendarStrip {
    pub fn new(anchor: NaiveDate, week_start: WeekStart) -> Self {
        Self {
            anchor: clamp_anchor(anchor),
            week_start,
        }
    }

    pub const fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub const fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.anchor = clamp_anchor(date);
    }

    /// Moves the anchor one week back or forward.
    pub fn advance_week(&mut self, direction: WeekDirection) {
        self.shift_weeks(direction.weeks());
    }

    /// Moves the anchor by `weeks` whole weeks (negative goes back).
    /// Saturates at the ends of the representable date range.
    pub fn shift_weeks(&mut self, weeks: i64) {
        let (lowest, highest) = anchor_bounds();
        let days = weeks
            .unsigned_abs()
            .checked_mul(DAYS_PER_WEEK as u64)
            .filter(|days| *days <= MAX_SHIFT_DAYS)
            .map(Days::new);
        let moved = if weeks >= 0 {
            days.and_then(|d| self.anchor.checked_add_days(d))
        } else {
            days.and_then(|d| self.anchor.checked_sub_days(d))
        };
        self.anchor = match moved {
            Some(date) if clamp_anchor(date) == date => date,
            _ => {
                let edge = if weeks >= 0 { highest } else { lowest };
                debug!("Week shift of {} saturated at {}", weeks, edge);
                edge
            }
        };
    }

    pub fn week(&self) -> [NaiveDate; DAYS_PER_WEEK] {
        select_week(self.anchor, self.week_start)
    }

    pub fn is_completed(&self, date: NaiveDate, completions: &CompletionSet) -> bool {
        completions.contains(date)
    }

    pub fn days(&self, completions: &CompletionSet) -> Vec<CalendarDay> {
        self.week()
            .into_iter()
            .map(|date| CalendarDay {
                date,
                completed: completions.contains(date),
                selected: date == self.anchor,
            })
            .collect()
    }

    /// Heading for the strip, e.g. "March 2024".
    pub fn month_label(&self) -> String {
        self.anchor.format("%B %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    // 2024-03-13 is a Wednesday
    #[case(date(2024, 3, 13), WeekStart::Sunday, date(2024, 3, 10))]
    #[case(date(2024, 3, 13), WeekStart::Monday, date(2024, 3, 11))]
    #[case(date(2024, 3, 10), WeekStart::Sunday, date(2024, 3, 10))]
    #[case(date(2024, 3, 10), WeekStart::Monday, date(2024, 3, 4))]
    #[case(date(2024, 1, 1), WeekStart::Sunday, date(2023, 12, 31))]
    #[case(date(2024, 3, 2), WeekStart::Sunday, date(2024, 2, 25))]
    fn test_select_week_first_day(
        #[case] anchor: NaiveDate,
        #[case] week_start: WeekStart,
        #[case] expected_first: NaiveDate,
    ) {
        let week = select_week(anchor, week_start);
        assert_eq!(week[0], expected_first);
        assert_eq!(week[0].weekday(), Weekday::from(week_start));
    }

    #[test]
    fn test_select_week_is_seven_consecutive_days_containing_anchor() {
        let mut anchor = date(2023, 12, 20);
        for _ in 0..60 {
            for week_start in [WeekStart::Sunday, WeekStart::Monday] {
                let week = select_week(anchor, week_start);
                assert!(week.contains(&anchor));
                for pair in week.windows(2) {
                    assert_eq!(pair[1] - pair[0], Duration::days(1));
                }
            }
            anchor += Duration::days(1);
        }
    }

    #[test]
    fn test_advance_week_round_trip() {
        let mut strip = CalendarStrip::new(date(2024, 3, 13), WeekStart::Sunday);
        let original = strip.week();

        strip.advance_week(WeekDirection::Next);
        assert_eq!(strip.anchor(), date(2024, 3, 20));
        assert_ne!(strip.week(), original);

        strip.advance_week(WeekDirection::Previous);
        assert_eq!(strip.week(), original);
    }

    #[test]
    fn test_shift_weeks_goes_far_into_the_past() {
        let mut strip = CalendarStrip::new(date(2024, 3, 13), WeekStart::Monday);
        strip.shift_weeks(-520);
        assert_eq!(strip.anchor(), date(2014, 3, 26));
        strip.shift_weeks(520);
        assert_eq!(strip.anchor(), date(2024, 3, 13));
    }

    #[test]
    fn test_days_flags_completed_and_selected() {
        let strip = CalendarStrip::new(date(2024, 3, 13), WeekStart::Sunday);
        let completions: CompletionSet = [date(2024, 3, 12), date(2024, 3, 14), date(2024, 3, 30)]
            .into_iter()
            .collect();

        let days = strip.days(&completions);
        assert_eq!(days.len(), DAYS_PER_WEEK);
        let completed: Vec<NaiveDate> = days.iter().filter(|d| d.completed).map(|d| d.date).collect();
        assert_eq!(completed, vec![date(2024, 3, 12), date(2024, 3, 14)]);
        let selected: Vec<NaiveDate> = days.iter().filter(|d| d.selected).map(|d| d.date).collect();
        assert_eq!(selected, vec![date(2024, 3, 13)]);
        assert_eq!(days[0].weekday_label(), "Sun");
        assert!(strip.is_completed(date(2024, 3, 30), &completions));
        assert_eq!(strip.month_label(), "March 2024");
    }

    #[test]
    fn test_completion_set_is_idempotent() {
        let mut completions = CompletionSet::new();
        assert!(completions.insert(date(2024, 3, 5)));
        assert!(!completions.insert(date(2024, 3, 5)));
        assert!(completions.insert(date(2024, 3, 1)));
        assert_eq!(completions.len(), 2);
        assert!(completions.contains(date(2024, 3, 1)));
    }

    #[rstest]
    #[case(20_000_000)]
    #[case(i64::MAX)]
    fn test_huge_forward_shift_saturates(#[case] weeks: i64) {
        let mut strip = CalendarStrip::new(date(2024, 3, 12), WeekStart::Sunday);
        strip.shift_weeks(weeks);
        assert_eq!(strip.anchor(), anchor_bounds().1);
        assert_eq!(strip.days(&CompletionSet::new()).len(), DAYS_PER_WEEK);

        strip.advance_week(WeekDirection::Next);
        assert_eq!(strip.anchor(), anchor_bounds().1);
        strip.advance_week(WeekDirection::Previous);
        assert_eq!(strip.anchor(), anchor_bounds().1 - Duration::days(7));
    }

    #[rstest]
    #[case(-20_000_000)]
    #[case(i64::MIN)]
    fn test_huge_backward_shift_saturates(#[case] weeks: i64) {
        let mut strip = CalendarStrip::new(date(2024, 3, 12), WeekStart::Monday);
        strip.shift_weeks(weeks);
        assert_eq!(strip.anchor(), anchor_bounds().0);
        let week = strip.week();
        assert!(week.contains(&strip.anchor()));
    }

    #[test]
    fn test_edge_dates_still_give_a_full_week() {
        for week_start in [WeekStart::Sunday, WeekStart::Monday] {
            for edge in [NaiveDate::MIN, NaiveDate::MAX] {
                let week = select_week(edge, week_start);
                for pair in week.windows(2) {
                    assert_eq!(pair[1] - pair[0], Duration::days(1));
                }
            }
        }
        let mut strip = CalendarStrip::new(NaiveDate::MAX, WeekStart::Sunday);
        assert_eq!(strip.anchor(), anchor_bounds().1);
        strip.select_date(NaiveDate::MIN);
        assert_eq!(strip.anchor(), anchor_bounds().0);
    }
}

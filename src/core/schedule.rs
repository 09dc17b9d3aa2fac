//! Date buckets and filter resolution.
//!
//! Tasks are bucketed by the calendar day of their due date in the user's
//! time zone. [`Calendar`] pins both the zone and "today" so everything here
//! is deterministic under test.

use std::collections::BTreeMap;

use chrono::{
    DateTime, Datelike, Days, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone,
    Utc,
};
use tracing::debug;

use crate::core::task_service::TaskService;
use crate::db::task_repo;
use crate::error::Result;
use crate::types::{BucketCounts, DateBucket, DateFilter, Task};

/// Longest clock jump searched when a local time falls inside a DST gap.
const MAX_GAP_MINUTES: u32 = 24 * 60;

/// Inclusive UTC instant range covering one or more local days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Calendar<Tz: TimeZone> {
    tz: Tz,
    today: NaiveDate,
}

impl Calendar<Local> {
    /// The machine's zone, with today taken from the wall clock.
    pub fn local() -> Self {
        Self {
            tz: Local,
            today: Local::now().date_naive(),
        }
    }
}

impl<Tz: TimeZone> Calendar<Tz> {
    pub fn new(tz: Tz, today: NaiveDate) -> Self {
        Self { tz, today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn tomorrow(&self) -> NaiveDate {
        self.today + Days::new(1)
    }

    pub fn yesterday(&self) -> NaiveDate {
        self.today - Days::new(1)
    }

    /// Local calendar day an instant falls on.
    pub fn date_of(&self, instant: &DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// `[00:00:00.000, 23:59:59.999]` of `date`, local time.
    pub fn day_bounds(&self, date: NaiveDate) -> DayRange {
        let start = date.and_hms_milli_opt(0, 0, 0, 0).unwrap_or_default();
        let end = date.and_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
        DayRange {
            start: self.to_utc(start, false),
            end: self.to_utc(end, true),
        }
    }

    /// Noon of `date`, the instant used when a task is scheduled onto a day.
    pub fn midday(&self, date: NaiveDate) -> DateTime<Utc> {
        self.to_utc(date.and_hms_opt(12, 0, 0).unwrap_or_default(), false)
    }

    fn to_utc(&self, naive: NaiveDateTime, latest: bool) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(early, late) => {
                if latest {
                    late.with_timezone(&Utc)
                } else {
                    early.with_timezone(&Utc)
                }
            }
            // Skipped by a DST jump: start-of-day readings move forward to the
            // first valid instant, end-of-day readings back to the last one
            LocalResult::None => {
                let step = if latest {
                    -Duration::minutes(1)
                } else {
                    Duration::minutes(1)
                };
                let mut candidate = naive;
                for _ in 0..MAX_GAP_MINUTES {
                    candidate += step;
                    let found = if latest {
                        self.tz.from_local_datetime(&candidate).latest()
                    } else {
                        self.tz.from_local_datetime(&candidate).earliest()
                    };
                    if let Some(dt) = found {
                        return dt.with_timezone(&Utc);
                    }
                }
                naive.and_utc()
            }
        }
    }

    /// Concrete range for a filter, `None` meaning unfiltered.
    pub fn resolve(&self, filter: &DateFilter) -> Option<DayRange> {
        match filter {
            DateFilter::All => None,
            DateFilter::Today => Some(self.day_bounds(self.today)),
            DateFilter::Tomorrow => Some(self.day_bounds(self.tomorrow())),
            DateFilter::Yesterday => Some(self.day_bounds(self.yesterday())),
            DateFilter::Date(date) => Some(self.day_bounds(*date)),
            DateFilter::Range { start, end } => {
                let (first, last) = if start <= end {
                    (start, end)
                } else {
                    (end, start)
                };
                Some(DayRange {
                    start: self.day_bounds(*first).start,
                    end: self.day_bounds(*last).end,
                })
            }
        }
    }

    /// "Today", "Tomorrow", "Yesterday", "Mar 4", or "Mar 4, 2025" outside the current year.
    pub fn label(&self, date: NaiveDate) -> String {
        if date == self.today {
            "Today".to_string()
        } else if date == self.tomorrow() {
            "Tomorrow".to_string()
        } else if date == self.yesterday() {
            "Yesterday".to_string()
        } else if date.year() == self.today.year() {
            date.format("%b %-d").to_string()
        } else {
            date.format("%b %-d, %Y").to_string()
        }
    }

    /// The filter that selects exactly `date`.
    pub fn filter_for(&self, date: NaiveDate) -> DateFilter {
        if date == self.today {
            DateFilter::Today
        } else if date == self.tomorrow() {
            DateFilter::Tomorrow
        } else if date == self.yesterday() {
            DateFilter::Yesterday
        } else {
            DateFilter::Date(date)
        }
    }
}

impl<'a> TaskService<'a> {
    /// Load the tasks a filter selects.
    ///
    /// With `roll_forward`, the Today and Tomorrow buckets also pull in every
    /// incomplete task due before the bucket starts. Those overdue tasks come
    /// first, the most overdue last, followed by the day's own tasks in
    /// sibling order.
    pub fn load_tasks_for_filter<Tz: TimeZone>(
        &self,
        filter: &DateFilter,
        calendar: &Calendar<Tz>,
        roll_forward: bool,
    ) -> Result<Vec<Task>> {
        let Some(range) = calendar.resolve(filter) else {
            return task_repo::list_all(self.conn);
        };

        let own = task_repo::list_due_between(self.conn, &range.start, &range.end)?;
        if !(roll_forward && filter.rolls_forward()) {
            return Ok(own);
        }

        let mut tasks = task_repo::list_overdue(self.conn, &range.start)?;
        debug!(%filter, overdue = tasks.len(), own = own.len(), "rolled forward overdue tasks");
        tasks.extend(own);
        Ok(tasks)
    }

    /// Sorted distinct local due dates across all tasks.
    pub fn distinct_dates<Tz: TimeZone>(&self, calendar: &Calendar<Tz>) -> Result<Vec<NaiveDate>> {
        Ok(self.bucket_counts(calendar)?.into_keys().collect())
    }

    /// The browsable buckets: Today and Tomorrow always, Yesterday when it has
    /// tasks, then older dates with tasks (most recent first), then dates past
    /// tomorrow (soonest first). Counts are total and completed tasks due on
    /// that day.
    pub fn list_date_filters<Tz: TimeZone>(&self, calendar: &Calendar<Tz>) -> Result<Vec<DateBucket>> {
        let counts = self.bucket_counts(calendar)?;
        let bucket = |date: NaiveDate| DateBucket {
            filter: calendar.filter_for(date),
            date,
            label: calendar.label(date),
            counts: counts.get(&date).copied().unwrap_or_default(),
        };

        let (today, tomorrow, yesterday) =
            (calendar.today(), calendar.tomorrow(), calendar.yesterday());
        let mut buckets = vec![bucket(today), bucket(tomorrow)];
        if counts.contains_key(&yesterday) {
            buckets.push(bucket(yesterday));
        }
        buckets.extend(counts.range(..yesterday).rev().map(|(d, _)| bucket(*d)));
        buckets.extend(
            counts
                .range(tomorrow..)
                .filter(|(d, _)| **d != tomorrow)
                .map(|(d, _)| bucket(*d)),
        );
        Ok(buckets)
    }

    fn bucket_counts<Tz: TimeZone>(
        &self,
        calendar: &Calendar<Tz>,
    ) -> Result<BTreeMap<NaiveDate, BucketCounts>> {
        let mut counts: BTreeMap<NaiveDate, BucketCounts> = BTreeMap::new();
        for (due, completed) in task_repo::list_due_dates(self.conn)? {
            let entry = counts.entry(calendar.date_of(&due)).or_default();
            entry.total += 1;
            if completed {
                entry.completed += 1;
            }
        }
        Ok(counts)
    }
}

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, Utc};

use crate::error::Error;
use crate::types::{Comment, Task};

pub const INPUT_DATE_FORMAT: &str = "%d.%m.%Y";

/// The inclusive date range a report covers, from the start of the first day
/// to the last microsecond of the last day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
	pub start: DateTime<Utc>,
	pub end: DateTime<Utc>,
}

impl Window {
	pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, Error> {
		if start > end {
			return Err(Error::Usage(format!(
				"invalid time period: {} is after {}",
				start.format(INPUT_DATE_FORMAT),
				end.format(INPUT_DATE_FORMAT),
			)));
		}
		let start = start.and_time(NaiveTime::MIN).and_utc();
		let end = end.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::microseconds(1);
		Ok(Self { start, end })
	}

	pub fn contains(&self, time: DateTime<Utc>) -> bool {
		self.start <= time && time <= self.end
	}

	/// Latest creation time a task may have and still make it into the
	/// report: one calendar month past the window end. Tasks created shortly
	/// after the window can still carry backdated comments.
	pub fn creation_deadline(&self) -> DateTime<Utc> {
		self.end.checked_add_months(Months::new(1)).unwrap_or(self.end)
	}

	/// Date range label used in the report file name.
	pub fn label(&self) -> String {
		format!(
			"{}-{}",
			self.start.format(INPUT_DATE_FORMAT),
			self.end.format(INPUT_DATE_FORMAT),
		)
	}
}

pub fn parse_date(input: &str) -> Result<NaiveDate, Error> {
	NaiveDate::parse_from_str(input, INPUT_DATE_FORMAT)
		.map_err(|_| Error::Usage(format!("invalid date {:?}, expected DD.MM.YYYY", input)))
}

/// A comment counts towards the report when it carries work and its logged
/// date falls inside the window.
pub fn comment_counts(comment: &Comment, window: &Window) -> bool {
	comment.work_minutes() > 0 && window.contains(comment.logged_at())
}

/// A task is worth fetching comments for when it saw activity on or after
/// the window start and was not created long after the window end. A task
/// missing either timestamp passes that check.
pub fn task_touches_window(task: &Task, window: &Window) -> bool {
	let active = match task.activity {
		Some(activity) => activity >= window.start,
		None => true,
	};
	let created_in_time = match task.time_created {
		Some(created) => created <= window.creation_deadline(),
		None => true,
	};
	active && created_in_time
}

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Employee {
	pub id: i64,
	pub name: String,
	#[serde(default)]
	pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Project {
	pub id: i64,
	pub name: String,
	#[serde(default)]
	pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityRef {
	pub id: i64,
	#[serde(default)]
	pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
	pub id: i64,
	pub name: String,
	#[serde(default)]
	pub project: Option<EntityRef>,
	#[serde(default)]
	pub activity: Option<DateTime<Utc>>,
	#[serde(default)]
	pub time_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
	pub id: i64,
	#[serde(default)]
	pub author: Option<EntityRef>,
	#[serde(default)]
	pub work: Option<u64>,
	#[serde(default)]
	pub work_date: Option<DateTime<Utc>>,
	pub time_created: DateTime<Utc>,
}

impl Comment {
	/// Logged work in minutes, zero when the service sent none.
	pub fn work_minutes(&self) -> u64 {
		self.work.unwrap_or(0)
	}

	/// The date the work counts towards: the explicit work date when set,
	/// otherwise the creation date of the comment.
	pub fn logged_at(&self) -> DateTime<Utc> {
		self.work_date.unwrap_or(self.time_created)
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtraField {
	pub name: String,
	pub translation: String,
}

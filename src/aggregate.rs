use std::collections::BTreeMap;

use crate::collect::ReportData;
use crate::error::Error;

/// Work logged against one task, split by comment author.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskWork {
	pub task_id: i64,
	pub employee_work: BTreeMap<i64, u64>,
	pub total_work: u64,
}

/// Work rolled up for one project: its own comments plus its member tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectWork {
	pub project_id: i64,
	pub employee_comment_work: BTreeMap<i64, u64>,
	pub total_comment_work: u64,
	pub task_ids: Vec<i64>,
	pub total_work: u64,
	pub total_core_hours: f64,
	pub total_core_hours_planned: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeWork {
	pub employee_id: i64,
	pub total_work: u64,
	pub project_work: BTreeMap<i64, u64>,
}

/// The fully cross-indexed rollup. Entry order follows fetch order; minutes
/// everywhere, core hours as reported by the tracker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rollup {
	pub tasks: Vec<TaskWork>,
	pub projects: Vec<ProjectWork>,
	pub employees: Vec<EmployeeWork>,
	pub total_work: u64,
	pub total_core_hours: f64,
	pub total_core_hours_planned: f64,
}

/// Fold the filtered records into the rollup. Pure function of its input:
/// running it twice yields identical totals.
pub fn aggregate(data: &ReportData) -> Result<Rollup, Error> {
	// Per task: sum comment work per author and in total.
	let mut tasks = Vec::with_capacity(data.tasks.len());
	for record in &data.tasks {
		let mut work = TaskWork {
			task_id: record.task.id,
			..TaskWork::default()
		};
		for comment in &record.comments {
			let author = comment.author.as_ref()
				.ok_or(Error::MissingAuthor { comment_id: comment.id })?;
			let minutes = comment.work_minutes();
			*work.employee_work.entry(author.id).or_insert(0) += minutes;
			work.total_work += minutes;
		}
		tasks.push(work);
	}

	let task_index: BTreeMap<i64, usize> = data.tasks.iter()
		.enumerate()
		.map(|(i, record)| (record.task.id, i))
		.collect();

	// Per project: own comment work plus member task totals.
	let mut projects = Vec::with_capacity(data.projects.len());
	for project in &data.projects {
		let mut work = ProjectWork {
			project_id: project.id,
			..ProjectWork::default()
		};
		if let Some(comments) = data.project_comments.get(&project.id) {
			for comment in comments {
				let author = comment.author.as_ref()
					.ok_or(Error::MissingAuthor { comment_id: comment.id })?;
				let minutes = comment.work_minutes();
				*work.employee_comment_work.entry(author.id).or_insert(0) += minutes;
				work.total_comment_work += minutes;
			}
		}
		for (i, record) in data.tasks.iter().enumerate() {
			if record.project_id == project.id {
				work.task_ids.push(record.task.id);
				work.total_work += tasks[i].total_work;
				work.total_core_hours += record.core_hours_spent;
				work.total_core_hours_planned += record.core_hours_planned;
			}
		}
		work.total_work += work.total_comment_work;
		projects.push(work);
	}

	// Per employee: task work and project comment work, counted once each.
	// A comment attaches either to a task or to a project, never both.
	let mut employees = Vec::with_capacity(data.employees.len());
	for employee in &data.employees {
		let mut work = EmployeeWork {
			employee_id: employee.id,
			..EmployeeWork::default()
		};
		for task in &tasks {
			if let Some(&minutes) = task.employee_work.get(&employee.id) {
				work.total_work += minutes;
			}
		}
		for project in &projects {
			if let Some(&minutes) = project.employee_comment_work.get(&employee.id) {
				work.total_work += minutes;
			}
		}
		for project in &projects {
			let mut minutes = project.employee_comment_work.get(&employee.id).copied().unwrap_or(0);
			for task_id in &project.task_ids {
				if let Some(&i) = task_index.get(task_id) {
					minutes += tasks[i].employee_work.get(&employee.id).copied().unwrap_or(0);
				}
			}
			work.project_work.insert(project.project_id, minutes);
		}
		employees.push(work);
	}

	let total_work = projects.iter().map(|p| p.total_work).sum();
	let total_core_hours = projects.iter().map(|p| p.total_core_hours).sum();
	let total_core_hours_planned = projects.iter().map(|p| p.total_core_hours_planned).sum();

	Ok(Rollup {
		tasks,
		projects,
		employees,
		total_work,
		total_core_hours,
		total_core_hours_planned,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::collect::{TaskRecord, NO_PROJECT_ID};
	use crate::types::{Comment, Employee, EntityRef, Project, Task};
	use chrono::{TimeZone, Utc};
	use std::collections::BTreeMap;

	fn employee(id: i64, name: &str) -> Employee {
		Employee {
			id,
			name: name.to_string(),
			position: None,
		}
	}

	fn project(id: i64, name: &str) -> Project {
		Project {
			id,
			name: name.to_string(),
			status: None,
		}
	}

	fn comment(id: i64, author: Option<i64>, work: u64) -> Comment {
		Comment {
			id,
			author: author.map(|id| EntityRef { id, name: None }),
			work: Some(work),
			work_date: None,
			time_created: Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap(),
		}
	}

	fn task_record(task_id: i64, project_id: i64, comments: Vec<Comment>) -> TaskRecord {
		TaskRecord {
			task: Task {
				id: task_id,
				name: format!("task {}", task_id),
				project: None,
				activity: None,
				time_created: None,
			},
			project_id,
			comments,
			core_hours_spent: 0.0,
			core_hours_planned: 0.0,
		}
	}

	fn example_scenario() -> ReportData {
		// Two employees, one project without own comments, two tasks. T2's
		// only comment fell outside the window and was filtered out.
		let mut project_comments = BTreeMap::new();
		project_comments.insert(10, Vec::new());
		ReportData {
			employees: vec![employee(1, "A"), employee(2, "B")],
			projects: vec![project(10, "P1")],
			tasks: vec![
				task_record(100, 10, vec![comment(1, Some(1), 30), comment(2, Some(2), 45)]),
				task_record(101, 10, Vec::new()),
			],
			project_comments,
			core_hours: None,
		}
	}

	#[test]
	fn example_scenario_totals() {
		let rollup = aggregate(&example_scenario()).unwrap();

		assert_eq!(rollup.tasks[0].total_work, 75);
		assert_eq!(rollup.tasks[1].total_work, 0);
		assert_eq!(rollup.projects[0].total_work, 75);
		assert_eq!(rollup.employees[0].total_work, 30);
		assert_eq!(rollup.employees[1].total_work, 45);
		assert_eq!(rollup.employees[0].project_work[&10], 30);
		assert_eq!(rollup.employees[1].project_work[&10], 45);
		assert_eq!(rollup.total_work, 75);
		assert_eq!(rollup.total_core_hours, 0.0);
	}

	#[test]
	fn aggregation_is_idempotent() {
		let data = example_scenario();
		let first = aggregate(&data).unwrap();
		let second = aggregate(&data).unwrap();
		assert_eq!(first, second);
	}

	#[test]
	fn conservation_across_the_hierarchy() {
		let mut project_comments = BTreeMap::new();
		project_comments.insert(10, vec![comment(5, Some(2), 20)]);
		project_comments.insert(11, Vec::new());
		let data = ReportData {
			employees: vec![employee(1, "A"), employee(2, "B")],
			projects: vec![project(10, "P1"), project(11, "P2")],
			tasks: vec![
				task_record(100, 10, vec![comment(1, Some(1), 30)]),
				task_record(101, 11, vec![comment(2, Some(1), 10), comment(3, Some(2), 5)]),
			],
			project_comments,
			core_hours: None,
		};
		let rollup = aggregate(&data).unwrap();

		let task_sum: u64 = rollup.tasks.iter().map(|t| t.total_work).sum();
		let comment_sum: u64 = rollup.projects.iter().map(|p| p.total_comment_work).sum();
		let project_sum: u64 = rollup.projects.iter().map(|p| p.total_work).sum();
		assert_eq!(project_sum, task_sum + comment_sum);
		assert_eq!(rollup.total_work, project_sum);

		// Every surviving comment minute lands on exactly one employee.
		let employee_sum: u64 = rollup.employees.iter().map(|e| e.total_work).sum();
		assert_eq!(employee_sum, 30 + 10 + 5 + 20);
	}

	#[test]
	fn project_comments_are_not_double_counted() {
		let mut project_comments = BTreeMap::new();
		project_comments.insert(10, vec![comment(5, Some(1), 20)]);
		let data = ReportData {
			employees: vec![employee(1, "A")],
			projects: vec![project(10, "P1")],
			tasks: vec![task_record(100, 10, vec![comment(1, Some(1), 30)])],
			project_comments,
			core_hours: None,
		};
		let rollup = aggregate(&data).unwrap();
		assert_eq!(rollup.employees[0].total_work, 50);
		assert_eq!(rollup.employees[0].project_work[&10], 50);
		assert_eq!(rollup.projects[0].total_work, 50);
	}

	#[test]
	fn sentinel_project_aggregates_its_orphans() {
		let data = ReportData {
			employees: vec![employee(1, "A")],
			projects: vec![project(10, "P1"), project(NO_PROJECT_ID, "tasks without project")],
			tasks: vec![
				task_record(100, 10, vec![comment(1, Some(1), 30)]),
				task_record(101, NO_PROJECT_ID, vec![comment(2, Some(1), 15)]),
			],
			project_comments: BTreeMap::new(),
			core_hours: None,
		};
		let rollup = aggregate(&data).unwrap();
		let sentinel = rollup.projects.iter().find(|p| p.project_id == NO_PROJECT_ID).unwrap();
		assert_eq!(sentinel.task_ids, vec![101]);
		assert_eq!(sentinel.total_work, 15);
		assert_eq!(rollup.total_work, 45);
		assert_eq!(rollup.employees[0].project_work[&NO_PROJECT_ID], 15);
	}

	#[test]
	fn core_hours_sum_per_project_and_overall() {
		let mut data = example_scenario();
		data.tasks[0].core_hours_spent = 3.5;
		data.tasks[0].core_hours_planned = 4.0;
		data.tasks[1].core_hours_spent = 1.5;
		data.tasks[1].core_hours_planned = 2.0;
		let rollup = aggregate(&data).unwrap();
		assert_eq!(rollup.projects[0].total_core_hours, 5.0);
		assert_eq!(rollup.projects[0].total_core_hours_planned, 6.0);
		assert_eq!(rollup.total_core_hours, 5.0);
		assert_eq!(rollup.total_core_hours_planned, 6.0);
	}

	#[test]
	fn a_work_comment_without_author_is_a_data_error() {
		let data = ReportData {
			employees: vec![employee(1, "A")],
			projects: vec![project(10, "P1")],
			tasks: vec![task_record(100, 10, vec![comment(7, None, 30)])],
			project_comments: BTreeMap::new(),
			core_hours: None,
		};
		let result = aggregate(&data);
		assert!(matches!(result, Err(Error::MissingAuthor { comment_id: 7 })));
	}

	#[test]
	fn work_by_an_unknown_author_still_counts_into_totals() {
		// Author 99 is not in the employee list (left the company); their
		// minutes stay in the task and project totals.
		let data = ReportData {
			employees: vec![employee(1, "A")],
			projects: vec![project(10, "P1")],
			tasks: vec![task_record(100, 10, vec![comment(1, Some(99), 30)])],
			project_comments: BTreeMap::new(),
			core_hours: None,
		};
		let rollup = aggregate(&data).unwrap();
		assert_eq!(rollup.total_work, 30);
		assert_eq!(rollup.employees[0].total_work, 0);
	}
}

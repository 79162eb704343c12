use std::collections::BTreeMap;

use crate::api_client::{ApiClient, CommentSubject};
use crate::error::Error;
use crate::extra_fields::{self, CoreHoursFields};
use crate::filter::{self, Window};
use crate::types::{Comment, Employee, Project, Task};

pub const NO_PROJECT_ID: i64 = -1;
pub const NO_PROJECT_NAME: &str = "tasks without project";

/// A task that survived filtering, with everything the aggregation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
	pub task: Task,
	pub project_id: i64,
	pub comments: Vec<Comment>,
	pub core_hours_spent: f64,
	pub core_hours_planned: f64,
}

/// Everything fetched and filtered for one reporting window. Records are
/// immutable from here on; all computed figures live in the rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
	pub employees: Vec<Employee>,
	pub projects: Vec<Project>,
	pub tasks: Vec<TaskRecord>,
	pub project_comments: BTreeMap<i64, Vec<Comment>>,
	pub core_hours: Option<CoreHoursFields>,
}

pub async fn collect_report_data(
	api: &ApiClient,
	window: &Window,
	project_filter_id: Option<i64>,
) -> Result<ReportData, Error> {
	let employees = api.get_employees().await?;
	log::info!("loaded {} employees", employees.len());

	let mut projects = api.get_projects(project_filter_id).await?;
	log::info!("loaded {} projects", projects.len());

	let mut project_comments = BTreeMap::new();
	for (i, project) in projects.iter().enumerate() {
		let comments = api.get_comments(CommentSubject::Project, project.id, Some(window.start)).await?;
		let kept: Vec<Comment> = comments.iter()
			.filter(|c| filter::comment_counts(c, window))
			.cloned()
			.collect();
		log::info!(
			"project {}/{}: loaded {} comments, kept {}",
			i + 1, projects.len(), comments.len(), kept.len(),
		);
		project_comments.insert(project.id, kept);
	}

	let all_tasks = api.get_tasks().await?;
	log::info!("loaded {} tasks", all_tasks.len());
	let tasks: Vec<Task> = all_tasks.into_iter()
		.filter(|t| filter::task_touches_window(t, window))
		.collect();
	log::info!("{} tasks touch the reporting window", tasks.len());

	let core_hours = resolve_core_hours(api, &tasks).await?;

	let mut core_values = vec![(0.0, 0.0); tasks.len()];
	if let Some(fields) = &core_hours {
		let names = fields.names();
		for (i, task) in tasks.iter().enumerate() {
			let card = api.get_task_card(task.id, &names).await?;
			let spent = extra_fields::numeric_field(&card, &fields.spent.task_key);
			let planned = extra_fields::numeric_field(&card, &fields.planned.task_key);
			log::info!(
				"task {}/{}: {}={} {}={}",
				i + 1, tasks.len(), fields.spent.translation, spent, fields.planned.translation, planned,
			);
			core_values[i] = (spent, planned);
		}
	}

	let project_ids = reassign_orphans(&mut projects, &tasks);

	let task_count = tasks.len();
	let mut records = Vec::with_capacity(task_count);
	for (i, task) in tasks.into_iter().enumerate() {
		let comments = api.get_comments(CommentSubject::Task, task.id, Some(window.start)).await?;
		let kept: Vec<Comment> = comments.iter()
			.filter(|c| filter::comment_counts(c, window))
			.cloned()
			.collect();
		log::info!(
			"task {}/{}: loaded {} comments, kept {}",
			i + 1, task_count, comments.len(), kept.len(),
		);
		records.push(TaskRecord {
			task,
			project_id: project_ids[i],
			comments: kept,
			core_hours_spent: core_values[i].0,
			core_hours_planned: core_values[i].1,
		});
	}

	// Tasks with no window work and no spent core hours carry nothing into
	// the report.
	let before = records.len();
	records.retain(|r| !r.comments.is_empty() || r.core_hours_spent > 0.0);
	if records.len() != before {
		log::info!("ignoring {} tasks without comments or core hours", before - records.len());
		log::info!("{} tasks remain after all filtering", records.len());
	}

	Ok(ReportData {
		employees,
		projects,
		tasks: records,
		project_comments,
		core_hours,
	})
}

/// Find the core-hours field pair from the first task that exposes custom
/// fields at all. Resolution failure is tolerated: the run continues
/// without core-hours columns.
async fn resolve_core_hours(api: &ApiClient, tasks: &[Task]) -> Result<Option<CoreHoursFields>, Error> {
	for task in tasks {
		let fields = api.get_task_extra_fields(task.id).await?;
		if fields.is_empty() {
			continue;
		}
		let labels: Vec<&str> = fields.iter().map(|f| f.translation.as_str()).collect();
		log::info!("found task custom fields: {}", labels.join(", "));
		let resolved = CoreHoursFields::resolve(&fields);
		match &resolved {
			Some(fields) => log::info!(
				"core hours fields: spent={:?} planned={:?}",
				fields.spent.translation, fields.planned.translation,
			),
			None => log::warn!("could not identify the core hours fields, the report will not include them"),
		}
		return Ok(resolved);
	}
	log::warn!("no task exposes custom fields, the report will not include core hours");
	Ok(None)
}

/// Assign every task a project id, inventing the sentinel project for tasks
/// that reference none. Returns one project id per task, in task order.
fn reassign_orphans(projects: &mut Vec<Project>, tasks: &[Task]) -> Vec<i64> {
	let ids: Vec<i64> = tasks.iter()
		.map(|t| t.project.as_ref().map_or(NO_PROJECT_ID, |p| p.id))
		.collect();
	let orphans = ids.iter().filter(|&&id| id == NO_PROJECT_ID).count();
	if orphans > 0 {
		log::info!("found {} tasks without a project", orphans);
		projects.push(Project {
			id: NO_PROJECT_ID,
			name: NO_PROJECT_NAME.to_string(),
			status: None,
		});
	}
	ids
}

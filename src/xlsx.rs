use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::aggregate::{Rollup, TaskWork};
use crate::collect::{ReportData, TaskRecord};
use crate::error::Error;
use crate::filter::Window;

/// Render the rollup as a spreadsheet: one row per project with its inline
/// total, followed by its task rows, one column per employee, and a grand
/// total row at the bottom.
pub fn write_report(data: &ReportData, rollup: &Rollup, window: &Window, outdir: &Path) -> Result<PathBuf, Error> {
	let path = outdir.join(format!("work-report-{}.xlsx", window.label()));

	let mut workbook = Workbook::new();
	fill_sheet(workbook.add_worksheet(), data, rollup)
		.map_err(|e| Error::ReportWrite { path: path.clone(), message: e.to_string() })?;

	match workbook.save(&path) {
		Ok(()) => Ok(path),
		Err(XlsxError::IoError(e)) if file_locked(&e) => Err(Error::ReportFileBusy(path)),
		Err(e) => Err(Error::ReportWrite { path, message: e.to_string() }),
	}
}

fn fill_sheet(sheet: &mut Worksheet, data: &ReportData, rollup: &Rollup) -> Result<(), XlsxError> {
	let bold = Format::new().set_bold();
	let hours = Format::new().set_num_format("0.0");
	let hours_bold = Format::new().set_num_format("0.0").set_bold();

	sheet.set_name("Work report")?;
	sheet.set_column_width(0, 48)?;

	sheet.write_string_with_format(0, 0, "Project / task", &bold)?;
	let mut col: u16 = 1;
	for employee in &data.employees {
		sheet.write_string_with_format(0, col, &employee.name, &bold)?;
		col += 1;
	}
	let total_col = col;
	sheet.write_string_with_format(0, total_col, "Total (h)", &bold)?;
	sheet.write_string_with_format(0, total_col + 1, "Core hours spent", &bold)?;
	sheet.write_string_with_format(0, total_col + 2, "Core hours planned", &bold)?;

	let task_lookup: BTreeMap<i64, (&TaskRecord, &TaskWork)> = data.tasks.iter()
		.zip(&rollup.tasks)
		.map(|(record, work)| (record.task.id, (record, work)))
		.collect();

	let mut row: u32 = 1;
	for (project, work) in data.projects.iter().zip(&rollup.projects) {
		sheet.write_string_with_format(row, 0, &project.name, &bold)?;
		for (j, employee) in rollup.employees.iter().enumerate() {
			let minutes = employee.project_work.get(&work.project_id).copied().unwrap_or(0);
			if minutes > 0 {
				sheet.write_number_with_format(row, 1 + j as u16, minutes_as_hours(minutes), &hours_bold)?;
			}
		}
		sheet.write_number_with_format(row, total_col, minutes_as_hours(work.total_work), &hours_bold)?;
		sheet.write_number_with_format(row, total_col + 1, work.total_core_hours, &hours_bold)?;
		sheet.write_number_with_format(row, total_col + 2, work.total_core_hours_planned, &hours_bold)?;
		row += 1;

		for task_id in &work.task_ids {
			let (record, task_work) = match task_lookup.get(task_id) {
				Some(entry) => *entry,
				None => continue,
			};
			sheet.write_string(row, 0, &format!("    {}", record.task.name))?;
			for (j, employee) in rollup.employees.iter().enumerate() {
				if let Some(&minutes) = task_work.employee_work.get(&employee.employee_id) {
					sheet.write_number_with_format(row, 1 + j as u16, minutes_as_hours(minutes), &hours)?;
				}
			}
			sheet.write_number_with_format(row, total_col, minutes_as_hours(task_work.total_work), &hours)?;
			sheet.write_number_with_format(row, total_col + 1, record.core_hours_spent, &hours)?;
			sheet.write_number_with_format(row, total_col + 2, record.core_hours_planned, &hours)?;
			row += 1;
		}
	}

	sheet.write_string_with_format(row, 0, "Total", &bold)?;
	for (j, employee) in rollup.employees.iter().enumerate() {
		sheet.write_number_with_format(row, 1 + j as u16, minutes_as_hours(employee.total_work), &hours_bold)?;
	}
	sheet.write_number_with_format(row, total_col, minutes_as_hours(rollup.total_work), &hours_bold)?;
	sheet.write_number_with_format(row, total_col + 1, rollup.total_core_hours, &hours_bold)?;
	sheet.write_number_with_format(row, total_col + 2, rollup.total_core_hours_planned, &hours_bold)?;

	Ok(())
}

fn minutes_as_hours(minutes: u64) -> f64 {
	minutes as f64 / 60.0
}

/// The destination being open in a spreadsheet application shows up as a
/// busy or sharing violation from the OS.
fn file_locked(error: &std::io::Error) -> bool {
	if error.kind() == std::io::ErrorKind::PermissionDenied {
		return true;
	}
	// EBUSY / ETXTBSY on unix, ERROR_SHARING_VIOLATION on windows.
	matches!(error.raw_os_error(), Some(16) | Some(26) | Some(32))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::aggregate;
	use crate::types::{Comment, Employee, EntityRef, Project, Task};
	use chrono::{NaiveDate, TimeZone, Utc};

	fn sample_data() -> ReportData {
		let mut project_comments = BTreeMap::new();
		project_comments.insert(10, Vec::new());
		ReportData {
			employees: vec![Employee { id: 1, name: "Alice".to_string(), position: None }],
			projects: vec![Project { id: 10, name: "P1".to_string(), status: None }],
			tasks: vec![TaskRecord {
				task: Task {
					id: 100,
					name: "task".to_string(),
					project: Some(EntityRef { id: 10, name: None }),
					activity: None,
					time_created: None,
				},
				project_id: 10,
				comments: vec![Comment {
					id: 1,
					author: Some(EntityRef { id: 1, name: None }),
					work: Some(90),
					work_date: None,
					time_created: Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap(),
				}],
				core_hours_spent: 1.5,
				core_hours_planned: 2.0,
			}],
			project_comments,
			core_hours: None,
		}
	}

	#[test]
	fn writes_a_report_file_named_after_the_window() {
		let data = sample_data();
		let rollup = aggregate::aggregate(&data).unwrap();
		let window = Window::from_dates(
			NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
			NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
		).unwrap();
		let dir = tempfile::tempdir().unwrap();

		let path = write_report(&data, &rollup, &window, dir.path()).unwrap();
		assert_eq!(
			path.file_name().and_then(|n| n.to_str()),
			Some("work-report-01.03.2024-31.03.2024.xlsx"),
		);
		let metadata = std::fs::metadata(&path).unwrap();
		assert!(metadata.len() > 0);
	}

	#[test]
	fn a_missing_output_directory_is_a_write_error_not_a_panic() {
		let data = sample_data();
		let rollup = aggregate::aggregate(&data).unwrap();
		let window = Window::from_dates(
			NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
			NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
		).unwrap();

		let result = write_report(&data, &rollup, &window, Path::new("/nonexistent/outdir"));
		assert!(matches!(result, Err(Error::ReportWrite { .. }) | Err(Error::ReportFileBusy(_))));
	}
}

use chrono::Datelike;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

mod aggregate;
mod api_client;
mod collect;
mod config;
mod error;
mod extra_fields;
mod filter;
mod types;
mod xlsx;

use api_client::ApiClient;
use config::Config;
use error::Error;
use filter::Window;

#[derive(Parser)]
#[command(version)]
#[command(about = "Builds a per-employee work time spreadsheet from a Megaplan work tracker")]
struct Options {
	/// Server URL, like <name>.megaplan.ru.
	#[arg(short, long)]
	server: Option<String>,

	/// Username to log in with.
	#[arg(short, long)]
	user: Option<String>,

	/// Password. Prompted for when not given here or in the config file.
	#[arg(short, long)]
	password: Option<String>,

	/// Start of the reporting period, DD.MM.YYYY. Defaults to the first day
	/// of the current month.
	#[arg(long)]
	start: Option<String>,

	/// End of the reporting period, DD.MM.YYYY. Defaults to today.
	#[arg(long)]
	end: Option<String>,

	/// Directory to place the report into.
	#[arg(short, long)]
	outdir: Option<PathBuf>,

	/// Numeric id of the server side project filter.
	#[arg(long)]
	project_filter_id: Option<i64>,
}

#[tokio::main]
async fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let options = Options::parse();
	if let Err(error) = run(options).await {
		log::error!("{}", error);
		std::process::exit(error.exit_code());
	}
}

async fn run(options: Options) -> Result<(), Error> {
	let started = Instant::now();
	let config = Config::load(Config::default_path());

	let server = resolve(options.server, config.server, "server")?;
	let user = resolve(options.user, config.username, "username")?;
	log::info!("server: {}", server);
	log::info!("username: {}", user);
	let password = resolve(options.password, config.password, "password")?;

	let window = resolve_window(options.start.as_deref(), options.end.as_deref())?;
	log::info!("time period: {}", window.label());

	let outdir = options.outdir.unwrap_or_else(|| PathBuf::from("."));
	let project_filter_id = options.project_filter_id.or(config.project_filter_id);

	let api = ApiClient::login(&server, &user, &password).await?;
	log::info!("login success");

	let data = collect::collect_report_data(&api, &window, project_filter_id).await?;
	let rollup = aggregate::aggregate(&data)?;
	log::info!(
		"total work for the period: {} minutes ({:.1} hours)",
		rollup.total_work,
		rollup.total_work as f64 / 60.0,
	);
	if data.core_hours.is_some() {
		log::info!(
			"total core hours: {} spent, {} planned",
			rollup.total_core_hours,
			rollup.total_core_hours_planned,
		);
	}

	let path = xlsx::write_report(&data, &rollup, &window, &outdir)?;
	log::info!("report written to {}", path.display());
	log::info!("done in {:.2?}", started.elapsed());
	Ok(())
}

fn resolve(flag: Option<String>, saved: Option<String>, what: &str) -> Result<String, Error> {
	if let Some(value) = flag.or(saved) {
		return Ok(value);
	}
	let value = prompt(&format!("Please enter the {}: ", what))?;
	if value.is_empty() {
		return Err(Error::Usage(format!("no {} given", what)));
	}
	Ok(value)
}

fn prompt(message: &str) -> Result<String, Error> {
	use std::io::Write;

	print!("{}", message);
	std::io::stdout().flush().ok();
	let mut line = String::new();
	std::io::stdin().read_line(&mut line)
		.map_err(|e| Error::Usage(format!("failed to read input: {}", e)))?;
	Ok(line.trim().to_string())
}

fn resolve_window(start: Option<&str>, end: Option<&str>) -> Result<Window, Error> {
	let today = chrono::Utc::now().date_naive();
	let start = match start {
		Some(input) => filter::parse_date(input)?,
		None => today.with_day(1).unwrap_or(today),
	};
	let end = match end {
		Some(input) => filter::parse_date(input)?,
		None => today,
	};
	Window::from_dates(start, end)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_window_arguments_are_parsed() {
		let window = resolve_window(Some("01.03.2024"), Some("31.03.2024")).unwrap();
		assert_eq!(window.label(), "01.03.2024-31.03.2024");
	}

	#[test]
	fn a_reversed_period_is_a_usage_error() {
		let result = resolve_window(Some("01.04.2024"), Some("01.03.2024"));
		assert!(matches!(result, Err(Error::Usage(_))));
	}

	#[test]
	fn omitted_dates_default_to_the_current_month() {
		let window = resolve_window(None, None).unwrap();
		assert!(window.start <= window.end);
	}

	#[test]
	fn resolve_prefers_the_flag_over_the_config() {
		let value = resolve(Some("flag".to_string()), Some("saved".to_string()), "server").unwrap();
		assert_eq!(value, "flag");
		let value = resolve(None, Some("saved".to_string()), "server").unwrap();
		assert_eq!(value, "saved");
	}
}

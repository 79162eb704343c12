use reqwest::StatusCode;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Usage(String),

	#[error("authentication failed: {0}")]
	Auth(String),

	#[error("failed to get {url}: error sending request: {source}")]
	Request { url: String, source: reqwest::Error },

	#[error("failed to get {url}: server responded with status code {status}")]
	Status { url: String, status: StatusCode },

	#[error("failed to get {url}: error parsing response: {source}")]
	Decode { url: String, source: reqwest::Error },

	#[error("rate limited by the server")]
	RateLimited,

	#[error("comment {comment_id} has a work entry but no author")]
	MissingAuthor { comment_id: i64 },

	#[error("could not save the report to {}: the file is already open in another application, close it and run again", .0.display())]
	ReportFileBusy(PathBuf),

	#[error("could not write the report to {}: {message}", .path.display())]
	ReportWrite { path: PathBuf, message: String },
}

impl Error {
	/// Process exit code for the top-level handler. Usage errors are 1,
	/// anything that aborted the data run is 2, report write failures are 3.
	pub fn exit_code(&self) -> i32 {
		match self {
			Error::Usage(_) => 1,
			Error::Auth(_) => 2,
			Error::Request { .. } => 2,
			Error::Status { .. } => 2,
			Error::Decode { .. } => 2,
			Error::RateLimited => 2,
			Error::MissingAuthor { .. } => 2,
			Error::ReportFileBusy(_) => 3,
			Error::ReportWrite { .. } => 3,
		}
	}
}

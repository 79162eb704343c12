use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;

use crate::error::Error;
use crate::types;

pub const DEFAULT_PAGE_SIZE: usize = 50;

pub struct ApiClient {
	http: reqwest::Client,
	api_root: String,
	auth_token: String,
	pub page_size: usize,
	pub retry: RetryPolicy,
}

/// Back-off behaviour for rate-limited page fetches. The production default
/// waits a fixed minute and never gives up; tests inject a zero-delay,
/// bounded policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	pub cooldown: Duration,
	pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			cooldown: Duration::from_secs(60),
			max_attempts: None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommentSubject {
	Task,
	Project,
}

impl CommentSubject {
	pub fn as_str(self) -> &'static str {
		match self {
			CommentSubject::Task => "task",
			CommentSubject::Project => "project",
		}
	}
}

/// Run a request, retrying after the policy cool-down for as long as the
/// server keeps answering with a rate-limit status. Any other error passes
/// straight through.
pub async fn with_retry<T, F, Fut>(retry: &RetryPolicy, mut call: F) -> Result<T, Error>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, Error>>,
{
	let mut attempts = 0u32;
	loop {
		match call().await {
			Err(Error::RateLimited) => {
				attempts += 1;
				if let Some(max) = retry.max_attempts {
					if attempts >= max {
						return Err(Error::RateLimited);
					}
				}
				log::warn!("rate limited by the server, retrying in {:?}", retry.cooldown);
				tokio::time::sleep(retry.cooldown).await;
			},
			result => return result,
		}
	}
}

/// Fetch a complete collection from a paginated resource.
///
/// Requests page 0, 1, 2, ... with `offset = page_size * page` until a page
/// comes back empty, concatenating the results in page order. A rate-limit
/// response retries the same page after the policy cool-down; any other
/// error aborts the whole fetch.
pub async fn fetch_all<T, F, Fut>(page_size: usize, retry: &RetryPolicy, mut fetch_page: F) -> Result<Vec<T>, Error>
where
	F: FnMut(usize, usize) -> Fut,
	Fut: Future<Output = Result<Vec<T>, Error>>,
{
	let mut records = Vec::new();
	let mut page = 0;
	loop {
		let offset = page_size * page;
		let batch = with_retry(retry, || fetch_page(page_size, offset)).await?;
		if batch.is_empty() {
			break;
		}
		records.extend(batch);
		page += 1;
	}
	Ok(records)
}

impl ApiClient {
	pub async fn login(server: &str, username: &str, password: &str) -> Result<Self, Error> {
		#[derive(serde::Deserialize)]
		struct Response {
			data: Data,
		}

		#[derive(serde::Deserialize)]
		struct Data {
			access_token: String,
		}

		let api_root = api_root(server);
		let http = reqwest::Client::new();
		let response = http.post(&format!("{}/BumsCommonApiV01/User/authorize.api", api_root))
			.form(&[("Login", username), ("Password", password)])
			.send()
			.await
			.map_err(|e| Error::Auth(format!("error sending request: {}", e)))?;

		if response.status() != StatusCode::OK {
			return Err(Error::Auth(format!("server responded with status code {}", response.status())));
		}

		let response: Response = response.json()
			.await
			.map_err(|e| Error::Auth(format!("error parsing response: {}", e)))?;

		Ok(Self {
			http,
			api_root,
			auth_token: response.data.access_token,
			page_size: DEFAULT_PAGE_SIZE,
			retry: RetryPolicy::default(),
		})
	}

	pub async fn get_employees(&self) -> Result<Vec<types::Employee>, Error> {
		#[derive(serde::Deserialize)]
		struct Response {
			data: Data,
		}

		#[derive(serde::Deserialize)]
		struct Data {
			#[serde(default)]
			employees: Vec<types::Employee>,
		}

		fetch_all(self.page_size, &self.retry, move |limit, offset| async move {
			let query = vec![
				("Limit", limit.to_string()),
				("Offset", offset.to_string()),
			];
			let response: Response = self.get_auth("BumsStaffApiV01/Employee/list.api", &query).await?;
			Ok(response.data.employees)
		}).await
	}

	pub async fn get_projects(&self, filter_id: Option<i64>) -> Result<Vec<types::Project>, Error> {
		#[derive(serde::Deserialize)]
		struct Response {
			data: Data,
		}

		#[derive(serde::Deserialize)]
		struct Data {
			#[serde(default)]
			projects: Vec<types::Project>,
		}

		fetch_all(self.page_size, &self.retry, move |limit, offset| async move {
			let mut query = vec![
				("Detailed", "true".to_string()),
				("Limit", limit.to_string()),
				("Offset", offset.to_string()),
			];
			if let Some(filter_id) = filter_id {
				query.push(("FilterId", filter_id.to_string()));
			}
			let response: Response = self.get_auth("BumsProjectApiV01/Project/list.api", &query).await?;
			Ok(response.data.projects)
		}).await
	}

	pub async fn get_tasks(&self) -> Result<Vec<types::Task>, Error> {
		#[derive(serde::Deserialize)]
		struct Response {
			data: Data,
		}

		#[derive(serde::Deserialize)]
		struct Data {
			#[serde(default)]
			tasks: Vec<types::Task>,
		}

		fetch_all(self.page_size, &self.retry, move |limit, offset| async move {
			let query = vec![
				("Detailed", "true".to_string()),
				("Limit", limit.to_string()),
				("Offset", offset.to_string()),
			];
			let response: Response = self.get_auth("BumsTaskApiV01/Task/list.api", &query).await?;
			Ok(response.data.tasks)
		}).await
	}

	/// Comments attached to a task or project. The `updated_after` bound is a
	/// server-side payload optimization only; callers still filter precisely.
	pub async fn get_comments(
		&self,
		subject: CommentSubject,
		subject_id: i64,
		updated_after: Option<DateTime<Utc>>,
	) -> Result<Vec<types::Comment>, Error> {
		#[derive(serde::Deserialize)]
		struct Response {
			data: Data,
		}

		#[derive(serde::Deserialize)]
		struct Data {
			#[serde(default)]
			comments: Vec<types::Comment>,
		}

		fetch_all(self.page_size, &self.retry, move |limit, offset| async move {
			let mut query = vec![
				("subject_type", subject.as_str().to_string()),
				("subject_id", subject_id.to_string()),
				("limit", limit.to_string()),
				("offset", offset.to_string()),
			];
			if let Some(updated_after) = updated_after {
				query.push(("time_updated", updated_after.to_rfc3339()));
			}
			let response: Response = self.get_auth("BumsCommonApiV01/Comment/list.api", &query).await?;
			Ok(response.data.comments)
		}).await
	}

	pub async fn get_task_extra_fields(&self, task_id: i64) -> Result<Vec<types::ExtraField>, Error> {
		#[derive(serde::Deserialize)]
		struct Response {
			data: Data,
		}

		#[derive(serde::Deserialize)]
		struct Data {
			#[serde(default)]
			fields: Vec<types::ExtraField>,
		}

		let query = vec![("Id", task_id.to_string())];
		let query = &query;
		let response: Response = with_retry(&self.retry, move || async move {
			self.get_auth("BumsTaskApiV01/Task/extFieldsMetadata.api", query).await
		}).await?;
		Ok(response.data.fields)
	}

	/// The full task card, as a raw object: the extra-field values live under
	/// deployment-specific keys only known at runtime.
	pub async fn get_task_card(
		&self,
		task_id: i64,
		extra_fields: &[String],
	) -> Result<serde_json::Map<String, serde_json::Value>, Error> {
		#[derive(serde::Deserialize)]
		struct Response {
			data: Data,
		}

		#[derive(serde::Deserialize)]
		struct Data {
			task: serde_json::Map<String, serde_json::Value>,
		}

		let mut query = vec![("Id", task_id.to_string())];
		for name in extra_fields {
			query.push(("ExtraFields[]", name.clone()));
		}
		let query = &query;
		let response: Response = with_retry(&self.retry, move || async move {
			self.get_auth("BumsTaskApiV01/Task/card.api", query).await
		}).await?;
		Ok(response.data.task)
	}

	async fn get_auth<T: serde::de::DeserializeOwned>(&self, relative_url: &str, query: &[(&str, String)]) -> Result<T, Error> {
		let response = self.http.get(&format!("{}/{}", self.api_root, relative_url))
			.basic_auth(&self.auth_token, Some(""))
			.query(query)
			.send()
			.await
			.map_err(|e| Error::Request { url: relative_url.to_string(), source: e })?;

		match response.status() {
			StatusCode::OK => {
				response.json().await.map_err(|e| Error::Decode { url: relative_url.to_string(), source: e })
			},
			StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited),
			status => Err(Error::Status { url: relative_url.to_string(), status }),
		}
	}
}

fn api_root(server: &str) -> String {
	let server = server.trim_end_matches('/');
	if server.starts_with("http://") || server.starts_with("https://") {
		server.to_string()
	} else {
		format!("https://{}", server)
	}
}

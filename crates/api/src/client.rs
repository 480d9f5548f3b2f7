use chrono::{DateTime, Utc};
use jobtrack_core::types::{Application, ApplicationId, NewApplication, Stage};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use url::Url;

const COLLECTION: &str = "jobApplications";
const CREATE_PATH: &str = "jobApplication";

/// Client for the job applications REST API.
#[derive(Clone)]
pub struct JobApplicationsClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl JobApplicationsClient {
    /// Creates a new client; `base_url` should end with a slash, e.g. `https://host/api/`.
    pub fn new(base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            token: None,
        }
    }

    /// Attaches a bearer token to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Fetches every application of the signed-in user.
    ///
    /// Records that fail to decode are logged and skipped so one bad entry does
    /// not hold back the rest of the board.
    pub async fn fetch_all(&self) -> Result<Vec<Application>, ApiError> {
        let url = self.base_url.join(COLLECTION)?;
        let response = self.request(Method::GET, url).send().await?;
        let records: Vec<Value> = parse_json(response).await?;
        Ok(decode_records(records))
    }

    /// Issues a PUT that moves an application to another stage.
    ///
    /// Returns the stored record when the backend echoes one back; an empty or
    /// unrecognised body still counts as a confirmation.
    pub async fn update_stage(
        &self,
        id: &ApplicationId,
        stage: Stage,
    ) -> Result<Option<Application>, ApiError> {
        let url = self.application_url(id)?;
        let body = serde_json::json!({ "status": stage.as_str() });
        let response = self.request(Method::PUT, url).json(&body).send().await?;

        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(serde_json::from_slice(&bytes).ok())
    }

    /// Creates an application and returns the stored record with its identifier.
    pub async fn create(&self, application: &NewApplication) -> Result<Application, ApiError> {
        self.create_at(application, Utc::now()).await
    }

    async fn create_at(
        &self,
        application: &NewApplication,
        created_at: DateTime<Utc>,
    ) -> Result<Application, ApiError> {
        let url = self.base_url.join(CREATE_PATH)?;
        let payload = CreateApplicationRequest {
            application,
            status_id: application.stage.status_id(),
            created_at,
        };
        let response = self
            .request(Method::POST, url)
            .json(&payload)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Replaces an application with the edited record.
    pub async fn update(&self, application: &Application) -> Result<Application, ApiError> {
        let url = self.application_url(&application.id)?;
        let response = self
            .request(Method::PUT, url)
            .json(application)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Deletes an application.
    pub async fn delete(&self, id: &ApplicationId) -> Result<(), ApiError> {
        let url = self.application_url(id)?;
        let response = self.request(Method::DELETE, url).send().await?;
        ensure_success(response).await.map(|_| ())
    }

    fn application_url(&self, id: &ApplicationId) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(COLLECTION)
            .push(id.as_str());
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateApplicationRequest<'a> {
    #[serde(flatten)]
    application: &'a NewApplication,
    status_id: &'static str,
    created_at: DateTime<Utc>,
}

/// Errors produced by the job applications client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("base url cannot be extended with path segments: {0}")]
    InvalidBaseUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend rejected the credentials")]
    Unauthorized,
    #[error("unexpected status {status}: {message}")]
    Status { status: StatusCode, message: String },
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<unavailable>"));
    Err(ApiError::Status {
        status,
        message: error_message(body),
    })
}

async fn parse_json<T>(response: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let response = ensure_success(response).await?;
    Ok(response.json().await?)
}

fn decode_records(records: Vec<Value>) -> Vec<Application> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record
                .get("id")
                .map(|id| id.to_string())
                .unwrap_or_else(|| String::from("<missing>"));
            match serde_json::from_value::<Application>(record) {
                Ok(application) => Some(application),
                Err(err) => {
                    warn!(stage = "api", application = %id, error = %err, "skipping undecodable application");
                    None
                }
            }
        })
        .collect()
}

/// Prefers the `message` field of a JSON error body over the raw text.
fn error_message(body: String) -> String {
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_string))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method;
    use jobtrack_core::types::FinancialInformation;
    use serde_json::json;

    fn client(base_url: &Url) -> JobApplicationsClient {
        JobApplicationsClient::new(base_url.clone(), Client::builder().build().expect("client"))
            .with_token("token")
    }

    fn record_json(id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "company": "Amazon",
            "jobTitle": "DevOps Engineer",
            "status": status,
            "applicationDate": "2024-01-10",
            "interviewDate": "2024-01-20T10:00:00Z",
            "notes": "Follow up",
            "contractType": "Full-Time",
            "jobDescription": "CI/CD pipelines",
            "createdAt": "2023-12-30T08:00:00Z",
            "financialInformation": "Negotiable",
            "location": "Seattle, WA"
        })
    }

    #[tokio::test]
    async fn fetch_all_parses_records() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/api/")).expect("url");

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/jobApplications")
                    .header("Authorization", "Bearer token");
                then.status(200).json_body(json!([
                    record_json("3", "Interviewing"),
                    record_json("9", "Archived")
                ]));
            })
            .await;

        let records = client(&base).fetch_all().await.expect("fetch all");
        mock.assert_async().await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stage.known(), Some(Stage::Interviewing));
        assert_eq!(records[1].stage.known(), None);
        assert_eq!(
            records[0].interview_date.as_deref(),
            Some("2024-01-20T10:00:00Z")
        );
    }

    #[tokio::test]
    async fn fetch_all_skips_records_that_do_not_decode() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/api/")).expect("url");

        let mut odd_date = record_json("4", "Applied");
        odd_date["applicationDate"] = json!("15/01/2024");
        let mut no_created_at = record_json("5", "Offer");
        no_created_at
            .as_object_mut()
            .expect("record object")
            .remove("createdAt");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/jobApplications");
                then.status(200)
                    .json_body(json!([record_json("3", "Wishlist"), odd_date, no_created_at]));
            })
            .await;

        let records = client(&base).fetch_all().await.expect("fetch all");

        let ids: Vec<_> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
        assert_eq!(records[1].application_date, None);
        assert_eq!(records[1].stage.known(), Some(Stage::Applied));
    }

    #[tokio::test]
    async fn update_stage_sends_status_and_accepts_empty_body() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/api/")).expect("url");

        let mock = server
            .mock_async(|when, then| {
                when.method(Method::PUT)
                    .path("/api/jobApplications/3")
                    .json_body(json!({ "status": "Offer" }));
                then.status(204);
            })
            .await;

        let confirmed = client(&base)
            .update_stage(&"3".into(), Stage::Offer)
            .await
            .expect("update stage");
        mock.assert_async().await;
        assert!(confirmed.is_none());
    }

    #[tokio::test]
    async fn update_stage_returns_echoed_record() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/api/")).expect("url");

        server
            .mock_async(|when, then| {
                when.method(Method::PUT).path("/api/jobApplications/3");
                then.status(200).json_body(record_json("3", "Offer"));
            })
            .await;

        let confirmed = client(&base)
            .update_stage(&"3".into(), Stage::Offer)
            .await
            .expect("update stage")
            .expect("record echoed");
        assert_eq!(confirmed.stage.known(), Some(Stage::Offer));
    }

    #[tokio::test]
    async fn create_posts_status_id() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/api/")).expect("url");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/jobApplication")
                    .json_body_partial(
                        json!({
                            "company": "Amazon",
                            "jobTitle": "DevOps Engineer",
                            "status": "Applied",
                            "statusId": "355bce13-f344-49f5-b198-b049751a6fc8",
                            "createdAt": "2024-02-01T09:30:00Z"
                        })
                        .to_string(),
                    );
                then.status(201).json_body(record_json("10", "Applied"));
            })
            .await;

        let new_application = NewApplication {
            company: "Amazon".to_string(),
            job_title: "DevOps Engineer".to_string(),
            stage: Stage::Applied,
            application_date: None,
            interview_date: None,
            notes: String::new(),
            contract_type: "Full-Time".to_string(),
            job_description: None,
            financial_information: FinancialInformation::default(),
            location: "Seattle, WA".to_string(),
        };
        let created_at = DateTime::parse_from_rfc3339("2024-02-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let created = client(&base)
            .create_at(&new_application, created_at)
            .await
            .expect("create");
        mock.assert_async().await;
        assert_eq!(created.id.as_str(), "10");
    }

    #[tokio::test]
    async fn delete_targets_application_path() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/api/")).expect("url");

        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/api/jobApplications/42")
                    .header("Authorization", "Bearer token");
                then.status(204);
            })
            .await;

        client(&base).delete(&"42".into()).await.expect("delete");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_is_reported() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/api/")).expect("url");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/jobApplications");
                then.status(401).body("expired");
            })
            .await;

        let err = client(&base).fetch_all().await.expect_err("should error");
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn error_status_prefers_json_message() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/api/")).expect("url");

        server
            .mock_async(|when, then| {
                when.method(Method::PUT).path("/api/jobApplications/3");
                then.status(400)
                    .json_body(json!({ "message": "status is not allowed" }));
            })
            .await;

        let err = client(&base)
            .update_stage(&"3".into(), Stage::Rejected)
            .await
            .expect_err("should error");
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "status is not allowed");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

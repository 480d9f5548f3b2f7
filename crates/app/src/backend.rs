use std::future::Future;

use jobtrack_api::{ApiError, JobApplicationsClient};
use jobtrack_core::{Application, ApplicationId, NewApplication, Stage};

/// Remote store the board synchronizes with.
///
/// Calls take owned arguments so the worker can hand them to spawned tasks.
pub trait BoardBackend: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + 'static;

    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Application>, Self::Error>> + Send;

    /// Persists a stage change; `None` means the backend confirmed without a record.
    fn update_stage(
        &self,
        id: ApplicationId,
        stage: Stage,
    ) -> impl Future<Output = Result<Option<Application>, Self::Error>> + Send;

    fn create(
        &self,
        application: NewApplication,
    ) -> impl Future<Output = Result<Application, Self::Error>> + Send;

    fn update(
        &self,
        application: Application,
    ) -> impl Future<Output = Result<Application, Self::Error>> + Send;

    fn delete(&self, id: ApplicationId) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl BoardBackend for JobApplicationsClient {
    type Error = ApiError;

    async fn fetch_all(&self) -> Result<Vec<Application>, ApiError> {
        JobApplicationsClient::fetch_all(self).await
    }

    async fn update_stage(
        &self,
        id: ApplicationId,
        stage: Stage,
    ) -> Result<Option<Application>, ApiError> {
        JobApplicationsClient::update_stage(self, &id, stage).await
    }

    async fn create(&self, application: NewApplication) -> Result<Application, ApiError> {
        JobApplicationsClient::create(self, &application).await
    }

    async fn update(&self, application: Application) -> Result<Application, ApiError> {
        JobApplicationsClient::update(self, &application).await
    }

    async fn delete(&self, id: ApplicationId) -> Result<(), ApiError> {
        JobApplicationsClient::delete(self, &id).await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use chrono::{DateTime, Utc};
    use jobtrack_core::types::FinancialInformation;
    use jobtrack_core::ApplicationStage;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    pub struct FakeError(pub String);

    #[derive(Default)]
    struct Script {
        fetches: VecDeque<Result<Vec<Application>, String>>,
        stage_updates: VecDeque<Result<Option<Application>, String>>,
        creates: VecDeque<Result<Application, String>>,
        updates: VecDeque<Result<Application, String>>,
        deletes: VecDeque<Result<(), String>>,
        calls: Vec<String>,
    }

    /// Scripted backend; unscripted calls succeed with an echo of their input.
    #[derive(Clone, Default)]
    pub struct FakeBackend {
        script: Arc<Mutex<Script>>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_fetch(&self, result: Result<Vec<Application>, &str>) {
            self.lock().fetches.push_back(result.map_err(str::to_string));
        }

        pub fn push_stage_update(&self, result: Result<Option<Application>, &str>) {
            self.lock()
                .stage_updates
                .push_back(result.map_err(str::to_string));
        }

        pub fn push_create(&self, result: Result<Application, &str>) {
            self.lock().creates.push_back(result.map_err(str::to_string));
        }

        pub fn push_delete(&self, result: Result<(), &str>) {
            self.lock().deletes.push_back(result.map_err(str::to_string));
        }

        pub fn calls(&self) -> Vec<String> {
            self.lock().calls.clone()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
            self.script.lock().expect("fake backend poisoned")
        }
    }

    impl BoardBackend for FakeBackend {
        type Error = FakeError;

        async fn fetch_all(&self) -> Result<Vec<Application>, FakeError> {
            let mut script = self.lock();
            script.calls.push("fetch_all".to_string());
            script
                .fetches
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
                .map_err(FakeError)
        }

        async fn update_stage(
            &self,
            id: ApplicationId,
            stage: Stage,
        ) -> Result<Option<Application>, FakeError> {
            let mut script = self.lock();
            script.calls.push(format!("update_stage {id} {stage}"));
            script
                .stage_updates
                .pop_front()
                .unwrap_or(Ok(None))
                .map_err(FakeError)
        }

        async fn create(&self, application: NewApplication) -> Result<Application, FakeError> {
            let mut script = self.lock();
            script.calls.push(format!("create {}", application.company));
            script
                .creates
                .pop_front()
                .unwrap_or_else(|| Ok(from_new("new", application)))
                .map_err(FakeError)
        }

        async fn update(&self, application: Application) -> Result<Application, FakeError> {
            let mut script = self.lock();
            script.calls.push(format!("update {}", application.id));
            script
                .updates
                .pop_front()
                .unwrap_or(Ok(application))
                .map_err(FakeError)
        }

        async fn delete(&self, id: ApplicationId) -> Result<(), FakeError> {
            let mut script = self.lock();
            script.calls.push(format!("delete {id}"));
            script.deletes.pop_front().unwrap_or(Ok(())).map_err(FakeError)
        }
    }

    fn created_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn from_new(id: &str, application: NewApplication) -> Application {
        Application {
            id: ApplicationId::from(id),
            company: application.company,
            job_title: application.job_title,
            stage: ApplicationStage::Known(application.stage),
            application_date: application.application_date,
            interview_date: application.interview_date,
            notes: application.notes,
            contract_type: application.contract_type,
            job_description: application.job_description,
            created_at: created_at(),
            financial_information: application.financial_information,
            location: application.location,
        }
    }

    pub fn application(id: &str, stage: Stage) -> Application {
        Application {
            id: ApplicationId::from(id),
            company: format!("Company {id}"),
            job_title: "Engineer".to_string(),
            stage: ApplicationStage::Known(stage),
            application_date: None,
            interview_date: None,
            notes: String::new(),
            contract_type: "Full-Time".to_string(),
            job_description: None,
            created_at: created_at(),
            financial_information: FinancialInformation::default(),
            location: String::new(),
        }
    }

    pub fn new_application(company: &str, stage: Stage) -> NewApplication {
        NewApplication {
            company: company.to_string(),
            job_title: "Engineer".to_string(),
            stage,
            application_date: None,
            interview_date: None,
            notes: String::new(),
            contract_type: "Full-Time".to_string(),
            job_description: None,
            financial_information: FinancialInformation::default(),
            location: String::new(),
        }
    }
}

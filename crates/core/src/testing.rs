use chrono::{DateTime, Utc};

use crate::types::{Application, ApplicationId, ApplicationStage, FinancialInformation, Stage};

pub(crate) fn application(id: &str, stage: Stage) -> Application {
    Application {
        id: ApplicationId::from(id),
        company: format!("Company {id}"),
        job_title: "Software Engineer".to_string(),
        stage: ApplicationStage::Known(stage),
        application_date: None,
        interview_date: None,
        notes: String::new(),
        contract_type: "Full-Time".to_string(),
        job_description: None,
        created_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc),
        financial_information: FinancialInformation::default(),
        location: "Remote".to_string(),
    }
}

pub(crate) fn ids(values: &[&str]) -> Vec<ApplicationId> {
    values.iter().map(|value| ApplicationId::from(*value)).collect()
}

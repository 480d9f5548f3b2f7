use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Number of board columns.
pub const STAGE_COUNT: usize = 5;

/// Pipeline stage of a job application. Declaration order is the column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Wishlist,
    Applied,
    Interviewing,
    Offer,
    Rejected,
}

impl Stage {
    /// All stages in board column order.
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::Wishlist,
        Stage::Applied,
        Stage::Interviewing,
        Stage::Offer,
        Stage::Rejected,
    ];

    /// Column index of the stage.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the canonical name used on the wire and in telemetry labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wishlist => "Wishlist",
            Self::Applied => "Applied",
            Self::Interviewing => "Interviewing",
            Self::Offer => "Offer",
            Self::Rejected => "Rejected",
        }
    }

    /// Backend status identifier sent as `statusId` when creating applications.
    pub fn status_id(self) -> &'static str {
        match self {
            Self::Wishlist => "17be4434-0cc8-48dc-ba2a-deadcc97f814",
            Self::Applied => "355bce13-f344-49f5-b198-b049751a6fc8",
            Self::Interviewing => "0c54c354-4958-480a-a757-3d6cd214bc7f",
            Self::Offer => "7979b18c-4eeb-4b29-9d33-89b996c431b1",
            Self::Rejected => "0d05157a-0519-4034-9716-316fe203af3a",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a token does not name one of the five stages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stage '{0}'")]
pub struct ParseStageError(pub String);

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == value)
            .ok_or_else(|| ParseStageError(value.to_string()))
    }
}

/// Stage value carried by an application record.
///
/// Records fetched from the backend may carry a status outside the closed
/// [`Stage`] set; those are kept verbatim so nothing is lost, but they are
/// never placed on the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApplicationStage {
    Known(Stage),
    Unknown(String),
}

impl ApplicationStage {
    /// Returns the board stage when the value is one of the known stages.
    pub fn known(&self) -> Option<Stage> {
        match self {
            Self::Known(stage) => Some(*stage),
            Self::Unknown(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(stage) => stage.as_str(),
            Self::Unknown(value) => value,
        }
    }
}

impl From<Stage> for ApplicationStage {
    fn from(value: Stage) -> Self {
        Self::Known(value)
    }
}

impl fmt::Display for ApplicationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ApplicationStage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApplicationStage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(match Stage::from_str(&value) {
            Ok(stage) => Self::Known(stage),
            Err(_) => Self::Unknown(value),
        })
    }
}

/// Stable identifier of an application, assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ApplicationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ApplicationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job application record as exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub company: String,
    pub job_title: String,
    #[serde(rename = "status")]
    pub stage: ApplicationStage,
    #[serde(
        default,
        deserialize_with = "optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub application_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub interview_date: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub contract_type: String,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub job_description: Option<String>,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub financial_information: FinancialInformation,
    #[serde(default)]
    pub location: String,
}

/// Compensation details; older records carry a free-text summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinancialInformation {
    Detailed(SalaryDetails),
    Summary(String),
}

impl Default for FinancialInformation {
    fn default() -> Self {
        Self::Summary(String::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryDetails {
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub salary_type: String,
    #[serde(default)]
    pub type_of_employment: String,
}

/// Fields submitted when creating an application; the backend assigns the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub company: String,
    pub job_title: String,
    #[serde(rename = "status")]
    pub stage: Stage,
    #[serde(
        default,
        deserialize_with = "optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub application_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub interview_date: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub contract_type: String,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub job_description: Option<String>,
    #[serde(default)]
    pub financial_information: FinancialInformation,
    #[serde(default)]
    pub location: String,
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|raw| !raw.trim().is_empty()))
}

fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => {
            // Backends frequently send midnight timestamps for plain dates.
            let date_part = raw.get(..10).unwrap_or(raw);
            match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                Ok(date) => Ok(Some(date)),
                Err(err) => {
                    warn!(stage = "types", value = raw, error = %err, "unreadable date dropped");
                    Ok(None)
                }
            }
        }
    }
}

fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(D::Error::custom)
}

/// Loading and error flags of the synchronization layer, for display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub pending_confirmations: usize,
}

/// Patch emitted to board subscribers describing a state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub version: u64,
    #[serde(rename = "type")]
    pub kind: PatchKind,
    pub at: DateTime<Utc>,
    pub data: Value,
}

impl Patch {
    /// Returns the patch type string.
    pub fn kind_str(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// Enumerates the supported patch kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    ColumnReordered,
    ApplicationMoved,
    ApplicationAdded,
    ApplicationUpdated,
    ApplicationRemoved,
    BoardReplace,
    SyncStatus,
}

impl PatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColumnReordered => "column.reordered",
            Self::ApplicationMoved => "application.moved",
            Self::ApplicationAdded => "application.added",
            Self::ApplicationUpdated => "application.updated",
            Self::ApplicationRemoved => "application.removed",
            Self::BoardReplace => "board.replace",
            Self::SyncStatus => "sync.status",
        }
    }
}

impl Serialize for PatchKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PatchKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        PatchKind::from_str(&value).map_err(|_| D::Error::custom("unknown patch kind"))
    }
}

impl FromStr for PatchKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "column.reordered" => Ok(Self::ColumnReordered),
            "application.moved" => Ok(Self::ApplicationMoved),
            "application.added" => Ok(Self::ApplicationAdded),
            "application.updated" => Ok(Self::ApplicationUpdated),
            "application.removed" => Ok(Self::ApplicationRemoved),
            "board.replace" => Ok(Self::BoardReplace),
            "sync.status" => Ok(Self::SyncStatus),
            _ => Err(()),
        }
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::board::Board;
use crate::types::{ApplicationId, Stage};

const REMINDER_LIMIT: usize = 5;
const ACTIVITY_LIMIT: usize = 10;

/// Application counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub wishlist: usize,
    pub applied: usize,
    pub interviewing: usize,
    pub offer: usize,
    pub rejected: usize,
}

/// Applications submitted in one calendar month (`YYYY-MM`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyApplications {
    pub month: String,
    pub applications: usize,
}

/// Upcoming interview of an application still in play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub id: ApplicationId,
    pub text: String,
    pub date: NaiveDate,
}

/// Recently added application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub id: ApplicationId,
    pub text: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    pub stats: DashboardStats,
    pub monthly_applications: Vec<MonthlyApplications>,
    pub reminders: Vec<Reminder>,
    pub activities: Vec<Activity>,
}

/// Derives dashboard figures from the current board.
///
/// `total` counts every stored record, including ones kept off the board.
/// Months are ordered chronologically; records without an application date
/// are not counted per month. Reminders cover interviews on or after `today`,
/// soonest first; activities list the newest records first.
pub fn board_stats(board: &Board, today: NaiveDate) -> BoardStats {
    let count = |stage: Stage| board.column(stage).len();
    let stats = DashboardStats {
        total: board.store().len(),
        wishlist: count(Stage::Wishlist),
        applied: count(Stage::Applied),
        interviewing: count(Stage::Interviewing),
        offer: count(Stage::Offer),
        rejected: count(Stage::Rejected),
    };

    let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for date in board.store().iter().filter_map(|record| record.application_date) {
        *months.entry((date.year(), date.month())).or_default() += 1;
    }

    BoardStats {
        stats,
        monthly_applications: months
            .into_iter()
            .map(|((year, month), applications)| MonthlyApplications {
                month: format!("{year:04}-{month:02}"),
                applications,
            })
            .collect(),
        reminders: reminders(board, today),
        activities: activities(board),
    }
}

fn reminders(board: &Board, today: NaiveDate) -> Vec<Reminder> {
    let mut reminders: Vec<Reminder> = board
        .store()
        .iter()
        .filter(|record| record.stage.known() != Some(Stage::Rejected))
        .filter_map(|record| {
            let date = interview_day(record.interview_date.as_deref()?)?;
            (date >= today).then(|| Reminder {
                id: record.id.clone(),
                text: format!("Interview with {} for {}", record.company, record.job_title),
                date,
            })
        })
        .collect();
    reminders.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    reminders.truncate(REMINDER_LIMIT);
    reminders
}

// Interview dates are free text; only a leading `YYYY-MM-DD` is understood.
fn interview_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

fn activities(board: &Board) -> Vec<Activity> {
    let mut activities: Vec<Activity> = board
        .store()
        .iter()
        .map(|record| Activity {
            id: record.id.clone(),
            text: format!(
                "Added {} ({}) to {}",
                record.company, record.job_title, record.stage
            ),
            date: record.created_at,
        })
        .collect();
    activities.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    activities.truncate(ACTIVITY_LIMIT);
    activities
}

//! Route handlers for exporting a user's data: CSV payloads, the aggregated
//! financial report, and the PDF report.
//!
//! Exports that read the ledger materialize due recurring expenses first so
//! the exported figures include expenses that have come due since the last
//! read. The goal export does not touch the ledger and skips that step.

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppConfig, Error,
    auth::Claims,
    budget::get_budgets,
    goal::{GoalStatus, get_goals},
    recurring::materialize_due,
    report::{budgets_to_csv, goals_to_csv, render_pdf_report, summarize, transactions_to_csv},
    transaction::{TransactionFilter, get_transactions},
};

/// A rendered CSV document and a suggested filename for saving it.
#[derive(Debug, Serialize)]
pub struct CsvExport {
    /// The rendered CSV text.
    pub data: String,
    /// A suggested filename, dated with the day of the export.
    pub filename: String,
}

/// The optional date range a report covers. Both bounds are inclusive.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRange {
    /// Only report transactions on or after this date.
    pub start_date: Option<NaiveDate>,
    /// Only report transactions on or before this date.
    pub end_date: Option<NaiveDate>,
}

impl ReportRange {
    fn to_filter(&self) -> TransactionFilter {
        TransactionFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            ..TransactionFilter::default()
        }
    }
}

/// A route handler for exporting the user's ledger as CSV.
///
/// Accepts the same query filters as the transaction list.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn export_transactions_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<CsvExport>, Error> {
    let today = Utc::now().date_naive();
    let connection = state.db_connection().lock().unwrap();
    materialize_due(claims.user_id(), today, &connection)?;

    let transactions = get_transactions(claims.user_id(), &filter, &connection)?;
    let data = transactions_to_csv(&transactions)?;

    Ok(Json(CsvExport {
        data,
        filename: format!("transactions_{today}.csv"),
    }))
}

/// A route handler for exporting the user's active budgets as CSV.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn export_budgets_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<CsvExport>, Error> {
    let today = Utc::now().date_naive();
    let connection = state.db_connection().lock().unwrap();
    materialize_due(claims.user_id(), today, &connection)?;

    let budgets = get_budgets(claims.user_id(), true, &connection)?;
    let data = budgets_to_csv(&budgets)?;

    Ok(Json(CsvExport {
        data,
        filename: format!("budgets_{today}.csv"),
    }))
}

/// A route handler for exporting the user's goals as CSV.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn export_goals_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<CsvExport>, Error> {
    let today = Utc::now().date_naive();
    let connection = state.db_connection().lock().unwrap();

    let goals = get_goals(claims.user_id(), &connection)?;
    let data = goals_to_csv(&goals)?;

    Ok(Json(CsvExport {
        data,
        filename: format!("goals_{today}.csv"),
    }))
}

/// A route handler for the aggregated financial report: summary figures plus
/// the ledger, budgets with remaining amounts, and goals with progress.
///
/// Accepts optional `startDate` and `endDate` query parameters bounding the
/// transactions the summary is computed over.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn financial_report_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Query(range): Query<ReportRange>,
) -> Result<Json<serde_json::Value>, Error> {
    let today = Utc::now().date_naive();
    let connection = state.db_connection().lock().unwrap();
    materialize_due(claims.user_id(), today, &connection)?;

    let transactions = get_transactions(claims.user_id(), &range.to_filter(), &connection)?;
    let budgets = get_budgets(claims.user_id(), true, &connection)?;
    let goals = get_goals(claims.user_id(), &connection)?;

    let summary = summarize(&transactions);
    let active_goal_count = goals
        .iter()
        .filter(|goal| goal.status == GoalStatus::Active)
        .count();

    let budgets: Vec<_> = budgets
        .into_iter()
        .map(|budget| {
            let remaining = budget.amount - budget.spent;
            json!({
                "id": budget.id,
                "name": budget.name,
                "category": budget.category,
                "amount": budget.amount,
                "spent": budget.spent,
                "remaining": remaining,
                "period": budget.period,
                "startDate": budget.start_date,
                "endDate": budget.end_date,
            })
        })
        .collect();

    let goals: Vec<_> = goals
        .into_iter()
        .map(|goal| {
            let progress_percent = goal.progress() * 100.0;
            json!({
                "id": goal.id,
                "name": goal.name,
                "targetAmount": goal.target_amount,
                "currentAmount": goal.current_amount,
                "progressPercent": progress_percent,
                "category": goal.category,
                "priority": goal.priority,
                "status": goal.status,
                "deadline": goal.deadline,
            })
        })
        .collect();

    Ok(Json(json!({
        "summary": {
            "totalIncome": summary.total_income,
            "totalExpenses": summary.total_expenses,
            "netSavings": summary.net_savings,
            "savingsRate": summary.savings_rate,
            "budgetCount": budgets.len(),
            "activeGoalCount": active_goal_count,
            "reportDate": today,
        },
        "transactions": transactions,
        "budgets": budgets,
        "goals": goals,
    })))
}

/// A route handler for downloading the PDF report.
///
/// Accepts the same optional `startDate` and `endDate` query parameters as
/// the financial report.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn pdf_report_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, Error> {
    let today = Utc::now().date_naive();
    let connection = state.db_connection().lock().unwrap();
    materialize_due(claims.user_id(), today, &connection)?;

    let transactions = get_transactions(claims.user_id(), &range.to_filter(), &connection)?;
    let summary = summarize(&transactions);
    let bytes = render_pdf_report(&summary, &transactions, today)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"financial_report_{today}.pdf\""),
            ),
        ],
        bytes,
    ))
}

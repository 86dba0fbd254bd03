//! Budgets: spending limits per category over a date period.
//!
//! A budget's `spent` value is never stored, it is recomputed on every read
//! as the sum of the owner's expense transactions in the budget's category
//! and period. Exceeding the limit is a signaled condition, not a rejected
//! write: the over-threshold query surfaces budgets where
//! `spent / amount >= alert_threshold`.

use std::{fmt::Display, str::FromStr};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use rusqlite::{
    Connection,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{AppConfig, AppJson, Error, auth::Claims, database_id::DatabaseID, user::UserID};

// ============================================================================
// MODELS
// ============================================================================

/// The nominal cycle a budget covers.
///
/// The period is descriptive, the spent computation uses the budget's
/// explicit start and end dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    /// Resets every week.
    Weekly,
    /// Resets every month.
    Monthly,
    /// Resets every year.
    Yearly,
}

impl BudgetPeriod {
    /// The period as the lowercase string stored in the database and sent
    /// over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
        }
    }
}

impl FromStr for BudgetPeriod {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "weekly" => Ok(BudgetPeriod::Weekly),
            "monthly" => Ok(BudgetPeriod::Monthly),
            "yearly" => Ok(BudgetPeriod::Yearly),
            _ => Err(Error::Validation(
                "period must be one of 'weekly', 'monthly' or 'yearly'".to_owned(),
            )),
        }
    }
}

impl Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for BudgetPeriod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for BudgetPeriod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// A spending limit for one category over a date period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// The ID of the budget.
    pub id: DatabaseID,
    /// The ID of the user that owns this budget.
    pub user_id: UserID,
    /// A display name for the budget.
    pub name: String,
    /// The category of expenses the budget limits.
    pub category: String,
    /// The spending limit.
    pub amount: f64,
    /// The sum of matching expenses within the period, recomputed on read.
    pub spent: f64,
    /// The nominal cycle the budget covers.
    pub period: BudgetPeriod,
    /// The first date counted towards the budget.
    pub start_date: NaiveDate,
    /// The last date counted towards the budget.
    pub end_date: NaiveDate,
    /// The spent/amount fraction at or above which the budget is considered
    /// over-limit.
    pub alert_threshold: f64,
    /// Whether the budget is counted. Budgets are deactivated instead of
    /// deleted.
    pub is_active: bool,
}

impl Budget {
    /// Whether the budget has reached its alert threshold.
    pub fn is_over_threshold(&self) -> bool {
        self.amount > 0.0 && self.spent / self.amount >= self.alert_threshold
    }
}

// ============================================================================
// DATABASE
// ============================================================================

/// Create the budget table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                period TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                alert_threshold REAL NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
                )",
        (),
    )?;

    Ok(())
}

// The spent column is derived on every read, see the module docs.
const SELECT_BUDGET: &str = "SELECT b.id, b.user_id, b.name, b.category, b.amount,
     COALESCE((SELECT SUM(t.amount) FROM \"transaction\" t
               WHERE t.user_id = b.user_id
                 AND t.kind = 'expense'
                 AND t.category = b.category
                 AND t.date >= b.start_date
                 AND t.date <= b.end_date), 0.0) AS spent,
     b.period, b.start_date, b.end_date, b.alert_threshold, b.is_active
     FROM budget b";

fn map_budget_row(row: &rusqlite::Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        category: row.get(3)?,
        amount: row.get(4)?,
        spent: row.get(5)?,
        period: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        alert_threshold: row.get(9)?,
        is_active: row.get(10)?,
    })
}

/// Create a new budget for `user_id`.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
#[allow(clippy::too_many_arguments)]
pub fn create_budget(
    user_id: UserID,
    name: &str,
    category: &str,
    amount: f64,
    period: BudgetPeriod,
    start_date: NaiveDate,
    end_date: NaiveDate,
    alert_threshold: f64,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection.execute(
        "INSERT INTO budget (user_id, name, category, amount, period, start_date, end_date, alert_threshold)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            user_id.as_i64(),
            name,
            category,
            amount,
            period,
            start_date,
            end_date,
            alert_threshold,
        ),
    )?;

    get_budget(user_id, connection.last_insert_rowid(), connection)
}

/// Get the budget with `budget_id` owned by `user_id`, with its spent value
/// recomputed.
///
/// # Errors
///
/// Returns [Error::NotFound] if no budget with that ID belongs to `user_id`.
pub fn get_budget(
    user_id: UserID,
    budget_id: DatabaseID,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(&format!("{SELECT_BUDGET} WHERE b.id = ?1 AND b.user_id = ?2"))?
        .query_row((budget_id, user_id.as_i64()), |row| map_budget_row(row))
        .map_err(|error| error.into())
}

/// Get all budgets of `user_id` with their spent values recomputed.
///
/// Set `active_only` to skip deactivated budgets.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
pub fn get_budgets(
    user_id: UserID,
    active_only: bool,
    connection: &Connection,
) -> Result<Vec<Budget>, Error> {
    let mut sql = format!("{SELECT_BUDGET} WHERE b.user_id = ?1");
    if active_only {
        sql.push_str(" AND b.is_active = 1");
    }
    sql.push_str(" ORDER BY b.id");

    let budgets = connection
        .prepare(&sql)?
        .query_map((user_id.as_i64(),), |row| map_budget_row(row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(budgets)
}

/// Get the active budgets of `user_id` that have reached their alert
/// threshold.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
pub fn get_over_threshold_budgets(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Budget>, Error> {
    let budgets = get_budgets(user_id, true, connection)?;

    Ok(budgets
        .into_iter()
        .filter(Budget::is_over_threshold)
        .collect())
}

/// The fields of a budget that may be changed after it is created.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUpdate {
    /// The new display name.
    pub name: Option<String>,
    /// The new category to track.
    pub category: Option<String>,
    /// The new spending limit, must be positive.
    pub amount: Option<f64>,
    /// The new period, sent as "weekly", "monthly" or "yearly".
    pub period: Option<String>,
    /// The new start of the tracked period.
    pub start_date: Option<NaiveDate>,
    /// The new end of the tracked period.
    pub end_date: Option<NaiveDate>,
    /// The new alert threshold as a fraction of the limit.
    pub alert_threshold: Option<f64>,
    /// Whether the budget should be active.
    pub is_active: Option<bool>,
}

/// Merge `update` into the budget with `budget_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no budget with that ID belongs to `user_id`,
/// or [Error::Validation] if the new amount, period, or threshold is invalid.
pub fn update_budget(
    user_id: UserID,
    budget_id: DatabaseID,
    update: &BudgetUpdate,
    connection: &Connection,
) -> Result<Budget, Error> {
    let period = update
        .period
        .as_deref()
        .map(BudgetPeriod::from_str)
        .transpose()?;

    if let Some(amount) = update.amount {
        validate_limit(amount)?;
    }

    if let Some(alert_threshold) = update.alert_threshold {
        validate_threshold(alert_threshold)?;
    }

    let rows_updated = connection.execute(
        "UPDATE budget
             SET name = COALESCE(?1, name),
                 category = COALESCE(?2, category),
                 amount = COALESCE(?3, amount),
                 period = COALESCE(?4, period),
                 start_date = COALESCE(?5, start_date),
                 end_date = COALESCE(?6, end_date),
                 alert_threshold = COALESCE(?7, alert_threshold),
                 is_active = COALESCE(?8, is_active)
             WHERE id = ?9 AND user_id = ?10",
        (
            update.name.as_deref(),
            update.category.as_deref(),
            update.amount,
            period,
            update.start_date,
            update.end_date,
            update.alert_threshold,
            update.is_active,
            budget_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    get_budget(user_id, budget_id, connection)
}

/// Deactivate the budget with `budget_id` owned by `user_id`.
///
/// Budgets are deactivated rather than deleted so their history survives.
///
/// # Errors
///
/// Returns [Error::NotFound] if no budget with that ID belongs to `user_id`.
pub fn deactivate_budget(
    user_id: UserID,
    budget_id: DatabaseID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_updated = connection.execute(
        "UPDATE budget SET is_active = 0 WHERE id = ?1 AND user_id = ?2",
        (budget_id, user_id.as_i64()),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn validate_limit(amount: f64) -> Result<(), Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(Error::Validation(
            "amount must be a positive number".to_owned(),
        ))
    }
}

fn validate_threshold(alert_threshold: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&alert_threshold) {
        Ok(())
    } else {
        Err(Error::Validation(
            "alert threshold must be a fraction between 0 and 1".to_owned(),
        ))
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The details sent by the client when creating a budget.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBudgetRequest {
    /// A display name for the budget.
    #[serde(default)]
    pub name: String,
    /// The category of expenses to track.
    #[serde(default)]
    pub category: String,
    /// The spending limit, must be positive.
    pub amount: f64,
    /// "weekly", "monthly" or "yearly".
    #[serde(default)]
    pub period: String,
    /// The start of the tracked period.
    pub start_date: NaiveDate,
    /// The end of the tracked period, inclusive.
    pub end_date: NaiveDate,
    /// The fraction of the limit at which the budget starts alerting.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

fn default_alert_threshold() -> f64 {
    0.8
}

/// A route handler for creating a new budget.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn create_budget_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    AppJson(request): AppJson<NewBudgetRequest>,
) -> Result<impl IntoResponse, Error> {
    if request.name.is_empty() || request.category.is_empty() {
        return Err(Error::Validation(
            "name and category are required".to_owned(),
        ));
    }

    let period: BudgetPeriod = request.period.parse()?;
    validate_limit(request.amount)?;
    validate_threshold(request.alert_threshold)?;

    if request.end_date < request.start_date {
        return Err(Error::Validation(
            "end date must not be before start date".to_owned(),
        ));
    }

    let connection = state.db_connection().lock().unwrap();
    let budget = create_budget(
        claims.user_id(),
        &request.name,
        &request.category,
        request.amount,
        period,
        request.start_date,
        request.end_date,
        request.alert_threshold,
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(budget)))
}

/// A route handler for listing the user's active budgets with recomputed
/// spent values.
///
/// Deactivated budgets are not listed.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn list_budgets_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<Vec<Budget>>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let budgets = get_budgets(claims.user_id(), true, &connection)?;

    Ok(Json(budgets))
}

/// A route handler for listing the user's budgets that are at or over their
/// alert threshold.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn budget_alerts_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<Vec<Budget>>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let budgets = get_over_threshold_budgets(claims.user_id(), &connection)?;

    Ok(Json(budgets))
}

/// A route handler for partially updating a budget.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn update_budget_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(budget_id): Path<DatabaseID>,
    AppJson(update): AppJson<BudgetUpdate>,
) -> Result<Json<Budget>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let budget = update_budget(claims.user_id(), budget_id, &update, &connection)?;

    Ok(Json(budget))
}

/// A route handler for deactivating a budget.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn delete_budget_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(budget_id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection().lock().unwrap();
    deactivate_budget(claims.user_id(), budget_id, &connection)?;

    Ok(Json(serde_json::json!({ "message": "Budget deactivated" })))
}

#[cfg(test)]
mod budget_tests {
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use crate::{
        PasswordHash,
        transaction::{TransactionKind, create_transaction, create_transaction_table},
        user::{UserID, create_user, create_user_table},
    };

    use super::{
        Budget, BudgetPeriod, BudgetUpdate, Error, create_budget, create_budget_table,
        deactivate_budget, get_budgets, get_over_threshold_budgets, update_budget,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");
        create_transaction_table(&conn).expect("Could not create transaction table");
        create_budget_table(&conn).expect("Could not create budget table");

        conn
    }

    fn insert_test_user(conn: &Connection, username: &str, email: &str) -> UserID {
        create_user(
            username,
            email,
            PasswordHash::new_unchecked("$2b$04$not.a.real.hash"),
            conn,
        )
        .expect("Could not insert test user")
        .id
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn insert_expense(conn: &Connection, user_id: UserID, category: &str, amount: f64) {
        create_transaction(
            user_id,
            TransactionKind::Expense,
            category,
            amount,
            date(2024, 1, 15),
            None,
            conn,
        )
        .unwrap();
    }

    fn insert_january_budget(conn: &Connection, user_id: UserID) -> Budget {
        create_budget(
            user_id,
            "Food budget",
            "Food",
            500.0,
            BudgetPeriod::Monthly,
            date(2024, 1, 1),
            date(2024, 1, 31),
            0.8,
            conn,
        )
        .unwrap()
    }

    #[test]
    fn spent_is_recomputed_from_matching_expenses() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        insert_january_budget(&conn, user_id);

        insert_expense(&conn, user_id, "Food", 120.0);
        insert_expense(&conn, user_id, "Food", 80.0);
        // Different category and income should not count.
        insert_expense(&conn, user_id, "Rent", 1000.0);
        create_transaction(
            user_id,
            TransactionKind::Income,
            "Food",
            50.0,
            date(2024, 1, 10),
            None,
            &conn,
        )
        .unwrap();

        let budgets = get_budgets(user_id, false, &conn).unwrap();

        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].spent, 200.0);
    }

    #[test]
    fn spent_excludes_expenses_outside_the_period() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        insert_january_budget(&conn, user_id);

        create_transaction(
            user_id,
            TransactionKind::Expense,
            "Food",
            99.0,
            date(2024, 2, 1),
            None,
            &conn,
        )
        .unwrap();

        let budgets = get_budgets(user_id, false, &conn).unwrap();

        assert_eq!(budgets[0].spent, 0.0);
    }

    #[test]
    fn alert_fires_only_at_or_over_threshold() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        insert_january_budget(&conn, user_id);

        // 350 / 500 = 0.7, below the 0.8 threshold.
        insert_expense(&conn, user_id, "Food", 350.0);
        assert!(
            get_over_threshold_budgets(user_id, &conn)
                .unwrap()
                .is_empty()
        );

        insert_expense(&conn, user_id, "Food", 100.0);
        let over = get_over_threshold_budgets(user_id, &conn).unwrap();
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].spent, 450.0);
    }

    #[test]
    fn exceeding_the_limit_is_signaled_not_rejected() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        insert_january_budget(&conn, user_id);

        // Spending past the limit must still be recorded.
        insert_expense(&conn, user_id, "Food", 870.0);

        let budgets = get_budgets(user_id, false, &conn).unwrap();
        assert_eq!(budgets[0].spent, 870.0);
        assert!(budgets[0].is_over_threshold());
    }

    #[test]
    fn delete_deactivates_instead_of_removing() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        let budget = insert_january_budget(&conn, user_id);

        deactivate_budget(user_id, budget.id, &conn).unwrap();

        let all = get_budgets(user_id, false, &conn).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);

        let active = get_budgets(user_id, true, &conn).unwrap();
        assert!(active.is_empty());
    }

    #[test]
    fn update_fails_for_other_users_budget() {
        let conn = get_db_connection();
        let alice = insert_test_user(&conn, "alice", "alice@example.com");
        let bob = insert_test_user(&conn, "bob", "bob@example.com");
        let budget = insert_january_budget(&conn, alice);

        let update = BudgetUpdate {
            amount: Some(600.0),
            ..Default::default()
        };

        assert_eq!(
            update_budget(bob, budget.id, &update, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn update_rejects_out_of_range_threshold() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        let budget = insert_january_budget(&conn, user_id);

        let update = BudgetUpdate {
            alert_threshold: Some(1.5),
            ..Default::default()
        };

        assert!(matches!(
            update_budget(user_id, budget.id, &update, &conn),
            Err(Error::Validation(_))
        ));
    }
}

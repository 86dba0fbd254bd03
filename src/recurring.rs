//! Recurring expense templates and their materialization into the ledger.
//!
//! A template describes an expense that repeats on a fixed cadence. Templates
//! never show up in reports themselves, instead due occurrences are
//! materialized into ordinary expense transactions. Materialization happens
//! lazily whenever the ledger is read, and on demand via its own endpoint.

use std::{fmt::Display, str::FromStr};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Days, Months, NaiveDate, Utc};
use rusqlite::{
    Connection,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppConfig, AppJson, Error,
    auth::Claims,
    database_id::DatabaseID,
    transaction::{TransactionKind, create_transaction, validate_amount},
    user::UserID,
};

// ============================================================================
// MODELS
// ============================================================================

/// How often a recurring expense comes due.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Due every day.
    Daily,
    /// Due every seven days.
    Weekly,
    /// Due on the same day of each month, clamped to the month's length.
    Monthly,
    /// Due on the same date each year, Feb 29 clamps to Feb 28.
    Yearly,
}

impl Frequency {
    /// The frequency as the lowercase string stored in the database and sent
    /// over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(Error::Validation(
                "frequency must be one of 'daily', 'weekly', 'monthly' or 'yearly'".to_owned(),
            )),
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// A template for an expense that repeats on a fixed cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringExpense {
    /// The ID of the template.
    pub id: DatabaseID,
    /// The ID of the user that owns this template.
    pub user_id: UserID,
    /// A display name, also used as the description of materialized
    /// transactions.
    pub name: String,
    /// The amount charged each occurrence.
    pub amount: f64,
    /// The category materialized transactions are filed under.
    pub category: String,
    /// How often the expense comes due.
    pub frequency: Frequency,
    /// The date of the first occurrence.
    pub start_date: NaiveDate,
    /// The date after which no more occurrences are due, inclusive.
    pub end_date: Option<NaiveDate>,
    /// An optional longer description.
    pub description: Option<String>,
    /// The date of the most recent occurrence that has been materialized.
    pub last_materialized: Option<NaiveDate>,
}

impl RecurringExpense {
    /// The date of the `index`-th occurrence, counted from zero.
    ///
    /// Occurrences are always stepped from the start date, never from the
    /// previous occurrence, so month-end clamping does not accumulate: a
    /// monthly expense starting January 31st falls due on February 28th (29th
    /// in a leap year) and then again on March 31st.
    fn occurrence(&self, index: u32) -> Option<NaiveDate> {
        match self.frequency {
            Frequency::Daily => self.start_date.checked_add_days(Days::new(u64::from(index))),
            Frequency::Weekly => self
                .start_date
                .checked_add_days(Days::new(7 * u64::from(index))),
            Frequency::Monthly => self.start_date.checked_add_months(Months::new(index)),
            Frequency::Yearly => self.start_date.checked_add_months(Months::new(12 * index)),
        }
    }

    /// All occurrence dates that are due but not yet materialized as of
    /// `today`: dates after `last_materialized`, no later than `today`, and
    /// no later than `end_date` if one is set.
    pub fn due_occurrences(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let horizon = match self.end_date {
            Some(end_date) => end_date.min(today),
            None => today,
        };

        let mut occurrences = Vec::new();

        for index in 0.. {
            let Some(date) = self.occurrence(index) else {
                break;
            };

            if date > horizon {
                break;
            }

            if self.last_materialized.is_none_or(|last| date > last) {
                occurrences.push(date);
            }
        }

        occurrences
    }
}

// ============================================================================
// DATABASE
// ============================================================================

/// Create the recurring expense table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_recurring_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_expense (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                name TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                frequency TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT,
                description TEXT,
                last_materialized TEXT
                )",
        (),
    )?;

    Ok(())
}

fn map_recurring_expense_row(row: &rusqlite::Row) -> Result<RecurringExpense, rusqlite::Error> {
    Ok(RecurringExpense {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        amount: row.get(3)?,
        category: row.get(4)?,
        frequency: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        description: row.get(8)?,
        last_materialized: row.get(9)?,
    })
}

const SELECT_RECURRING: &str =
    "SELECT id, user_id, name, amount, category, frequency, start_date, end_date,
     description, last_materialized FROM recurring_expense";

/// Create a new recurring expense template for `user_id`.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
#[allow(clippy::too_many_arguments)]
pub fn create_recurring_expense(
    user_id: UserID,
    name: &str,
    amount: f64,
    category: &str,
    frequency: Frequency,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    description: Option<&str>,
    connection: &Connection,
) -> Result<RecurringExpense, Error> {
    connection.execute(
        "INSERT INTO recurring_expense (user_id, name, amount, category, frequency, start_date, end_date, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            user_id.as_i64(),
            name,
            amount,
            category,
            frequency,
            start_date,
            end_date,
            description,
        ),
    )?;

    get_recurring_expense(user_id, connection.last_insert_rowid(), connection)
}

/// Get the template with `template_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no template with that ID belongs to `user_id`.
pub fn get_recurring_expense(
    user_id: UserID,
    template_id: DatabaseID,
    connection: &Connection,
) -> Result<RecurringExpense, Error> {
    connection
        .prepare(&format!("{SELECT_RECURRING} WHERE id = ?1 AND user_id = ?2"))?
        .query_row((template_id, user_id.as_i64()), |row| {
            map_recurring_expense_row(row)
        })
        .map_err(|error| error.into())
}

/// Get all recurring expense templates of `user_id`.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
pub fn get_recurring_expenses(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<RecurringExpense>, Error> {
    let templates = connection
        .prepare(&format!("{SELECT_RECURRING} WHERE user_id = ?1 ORDER BY id"))?
        .query_map((user_id.as_i64(),), |row| map_recurring_expense_row(row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(templates)
}

/// The fields of a recurring expense that may be changed after it is created.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringExpenseUpdate {
    /// The new display name.
    pub name: Option<String>,
    /// The new amount, must be positive.
    pub amount: Option<f64>,
    /// The new category.
    pub category: Option<String>,
    /// The new cadence, sent as "daily", "weekly", "monthly" or "yearly".
    pub frequency: Option<String>,
    /// The new first occurrence date.
    pub start_date: Option<NaiveDate>,
    /// The new last date occurrences are due, inclusive.
    pub end_date: Option<NaiveDate>,
    /// The new description.
    pub description: Option<String>,
}

/// Merge `update` into the template with `template_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no template with that ID belongs to `user_id`,
/// or [Error::Validation] if the new amount, frequency, or date range is
/// invalid.
pub fn update_recurring_expense(
    user_id: UserID,
    template_id: DatabaseID,
    update: &RecurringExpenseUpdate,
    connection: &Connection,
) -> Result<RecurringExpense, Error> {
    let frequency = update
        .frequency
        .as_deref()
        .map(Frequency::from_str)
        .transpose()?;

    if let Some(amount) = update.amount {
        validate_amount(amount)?;
    }

    // Check the merged date range against the stored template before
    // touching the row, so a rejected update leaves it unchanged.
    let current = get_recurring_expense(user_id, template_id, connection)?;
    let merged_start = update.start_date.unwrap_or(current.start_date);
    let merged_end = update.end_date.or(current.end_date);

    if let Some(end_date) = merged_end
        && end_date < merged_start
    {
        return Err(Error::Validation(
            "end date must not be before the start date".to_owned(),
        ));
    }

    connection.execute(
        "UPDATE recurring_expense
             SET name = COALESCE(?1, name),
                 amount = COALESCE(?2, amount),
                 category = COALESCE(?3, category),
                 frequency = COALESCE(?4, frequency),
                 start_date = COALESCE(?5, start_date),
                 end_date = COALESCE(?6, end_date),
                 description = COALESCE(?7, description)
             WHERE id = ?8 AND user_id = ?9",
        (
            update.name.as_deref(),
            update.amount,
            update.category.as_deref(),
            frequency,
            update.start_date,
            update.end_date,
            update.description.as_deref(),
            template_id,
            user_id.as_i64(),
        ),
    )?;

    get_recurring_expense(user_id, template_id, connection)
}

/// Delete the template with `template_id` owned by `user_id`.
///
/// Transactions already materialized from the template are kept.
///
/// # Errors
///
/// Returns [Error::NotFound] if no template with that ID belongs to `user_id`.
pub fn delete_recurring_expense(
    user_id: UserID,
    template_id: DatabaseID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_deleted = connection.execute(
        "DELETE FROM recurring_expense WHERE id = ?1 AND user_id = ?2",
        (template_id, user_id.as_i64()),
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Materialize every due occurrence of `user_id`'s recurring expenses as of
/// `today`, returning the number of transactions created.
///
/// Each occurrence becomes one expense transaction, and `last_materialized`
/// advances in the same SQL transaction, so re-running against unchanged
/// state creates nothing.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
pub fn materialize_due(
    user_id: UserID,
    today: NaiveDate,
    connection: &Connection,
) -> Result<usize, Error> {
    let templates = get_recurring_expenses(user_id, connection)?;

    let sql_transaction = connection.unchecked_transaction()?;
    let mut created = 0;

    for template in templates {
        let occurrences = template.due_occurrences(today);

        let Some(latest) = occurrences.last().copied() else {
            continue;
        };

        for date in occurrences {
            create_transaction(
                user_id,
                TransactionKind::Expense,
                &template.category,
                template.amount,
                date,
                Some(&template.name),
                &sql_transaction,
            )?;
            created += 1;
        }

        sql_transaction.execute(
            "UPDATE recurring_expense SET last_materialized = ?1 WHERE id = ?2",
            (latest, template.id),
        )?;
    }

    sql_transaction.commit()?;

    Ok(created)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The details sent by the client when creating a recurring expense.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecurringExpenseRequest {
    /// A display name for the expense.
    #[serde(default)]
    pub name: String,
    /// The amount charged each occurrence, must be positive.
    pub amount: f64,
    /// The category materialized transactions are filed under.
    #[serde(default)]
    pub category: String,
    /// "daily", "weekly", "monthly" or "yearly".
    #[serde(default)]
    pub frequency: String,
    /// The date of the first occurrence.
    pub start_date: NaiveDate,
    /// The date after which no more occurrences are due, inclusive.
    pub end_date: Option<NaiveDate>,
    /// An optional longer description.
    pub description: Option<String>,
}

/// A route handler for creating a new recurring expense template.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn create_recurring_expense_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    AppJson(request): AppJson<NewRecurringExpenseRequest>,
) -> Result<impl IntoResponse, Error> {
    if request.name.is_empty() || request.category.is_empty() {
        return Err(Error::Validation(
            "name and category are required".to_owned(),
        ));
    }

    validate_amount(request.amount)?;
    let frequency: Frequency = request.frequency.parse()?;

    if let Some(end_date) = request.end_date
        && end_date < request.start_date
    {
        return Err(Error::Validation(
            "end date must not be before the start date".to_owned(),
        ));
    }

    let connection = state.db_connection().lock().unwrap();
    let template = create_recurring_expense(
        claims.user_id(),
        &request.name,
        request.amount,
        &request.category,
        frequency,
        request.start_date,
        request.end_date,
        request.description.as_deref(),
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(template)))
}

/// A route handler for listing the user's recurring expense templates.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn list_recurring_expenses_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<Vec<RecurringExpense>>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let templates = get_recurring_expenses(claims.user_id(), &connection)?;

    Ok(Json(templates))
}

/// A route handler for partially updating a recurring expense template.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn update_recurring_expense_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(template_id): Path<DatabaseID>,
    AppJson(update): AppJson<RecurringExpenseUpdate>,
) -> Result<Json<RecurringExpense>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let template = update_recurring_expense(claims.user_id(), template_id, &update, &connection)?;

    Ok(Json(template))
}

/// A route handler for deleting a recurring expense template.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn delete_recurring_expense_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(template_id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection().lock().unwrap();
    delete_recurring_expense(claims.user_id(), template_id, &connection)?;

    Ok(Json(serde_json::json!({ "message": "Recurring expense removed" })))
}

/// A route handler for materializing due recurring expenses on demand.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn materialize_recurring_expenses_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let created = materialize_due(claims.user_id(), Utc::now().date_naive(), &connection)?;

    Ok(Json(serde_json::json!({
        "message": "Materialization complete",
        "created": created,
    })))
}

#[cfg(test)]
mod frequency_tests {
    use chrono::NaiveDate;

    use super::{Frequency, RecurringExpense};
    use crate::user::UserID;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn template(
        frequency: Frequency,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        last_materialized: Option<NaiveDate>,
    ) -> RecurringExpense {
        RecurringExpense {
            id: 1,
            user_id: UserID::new(1),
            name: "Rent".to_owned(),
            amount: 100.0,
            category: "Housing".to_owned(),
            frequency,
            start_date,
            end_date,
            description: None,
            last_materialized,
        }
    }

    #[test]
    fn daily_occurrences_step_one_day() {
        let template = template(Frequency::Daily, date(2024, 3, 1), None, None);

        assert_eq!(
            template.due_occurrences(date(2024, 3, 4)),
            vec![
                date(2024, 3, 1),
                date(2024, 3, 2),
                date(2024, 3, 3),
                date(2024, 3, 4)
            ]
        );
    }

    #[test]
    fn weekly_occurrences_step_seven_days() {
        let template = template(Frequency::Weekly, date(2024, 3, 1), None, None);

        assert_eq!(
            template.due_occurrences(date(2024, 3, 20)),
            vec![date(2024, 3, 1), date(2024, 3, 8), date(2024, 3, 15)]
        );
    }

    #[test]
    fn monthly_occurrences_clamp_to_month_end_without_drifting() {
        let template = template(Frequency::Monthly, date(2024, 1, 31), None, None);

        // February clamps to the 29th (2024 is a leap year), but March goes
        // back to the 31st because stepping is anchored at the start date.
        // April clamps to the 30th, which is due on the 30th itself.
        assert_eq!(
            template.due_occurrences(date(2024, 4, 30)),
            vec![
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30)
            ]
        );
    }

    #[test]
    fn yearly_occurrences_clamp_leap_day() {
        let template = template(Frequency::Yearly, date(2024, 2, 29), None, None);

        assert_eq!(
            template.due_occurrences(date(2026, 3, 1)),
            vec![date(2024, 2, 29), date(2025, 2, 28), date(2026, 2, 28)]
        );
    }

    #[test]
    fn occurrences_do_not_pass_the_end_date() {
        let template = template(
            Frequency::Monthly,
            date(2024, 1, 15),
            Some(date(2024, 3, 1)),
            None,
        );

        assert_eq!(
            template.due_occurrences(date(2024, 6, 1)),
            vec![date(2024, 1, 15), date(2024, 2, 15)]
        );
    }

    #[test]
    fn occurrences_before_last_materialized_are_skipped() {
        let template = template(
            Frequency::Monthly,
            date(2024, 1, 15),
            None,
            Some(date(2024, 2, 15)),
        );

        assert_eq!(
            template.due_occurrences(date(2024, 4, 20)),
            vec![date(2024, 3, 15), date(2024, 4, 15)]
        );
    }

    #[test]
    fn future_start_date_yields_no_occurrences() {
        let template = template(Frequency::Daily, date(2024, 6, 1), None, None);

        assert!(template.due_occurrences(date(2024, 5, 31)).is_empty());
    }
}

#[cfg(test)]
mod database_tests {
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use crate::{
        Error, PasswordHash,
        transaction::{TransactionFilter, create_transaction_table, get_transactions},
        user::{UserID, create_user, create_user_table},
    };

    use super::{
        Frequency, RecurringExpenseUpdate, create_recurring_expense,
        create_recurring_expense_table, get_recurring_expense, get_recurring_expenses,
        materialize_due, update_recurring_expense,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");
        create_transaction_table(&conn).expect("Could not create transaction table");
        create_recurring_expense_table(&conn).expect("Could not create recurring expense table");

        conn
    }

    fn insert_test_user(conn: &Connection) -> UserID {
        create_user(
            "alice",
            "alice@example.com",
            PasswordHash::new_unchecked("$2b$04$not.a.real.hash"),
            conn,
        )
        .expect("Could not insert test user")
        .id
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn materialize_creates_one_transaction_per_due_occurrence() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn);
        create_recurring_expense(
            user_id,
            "Gym membership",
            45.0,
            "Health",
            Frequency::Monthly,
            date(2024, 1, 10),
            None,
            None,
            &conn,
        )
        .unwrap();

        let created = materialize_due(user_id, date(2024, 3, 15), &conn).unwrap();

        assert_eq!(created, 3);

        let transactions =
            get_transactions(user_id, &TransactionFilter::default(), &conn).unwrap();
        assert_eq!(transactions.len(), 3);
        assert!(transactions.iter().all(|transaction| {
            transaction.amount == 45.0
                && transaction.category == "Health"
                && transaction.description.as_deref() == Some("Gym membership")
        }));
    }

    #[test]
    fn materialize_is_idempotent() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn);
        create_recurring_expense(
            user_id,
            "Streaming",
            12.0,
            "Entertainment",
            Frequency::Weekly,
            date(2024, 3, 1),
            None,
            None,
            &conn,
        )
        .unwrap();

        let first = materialize_due(user_id, date(2024, 3, 20), &conn).unwrap();
        let second = materialize_due(user_id, date(2024, 3, 20), &conn).unwrap();

        assert_eq!(first, 3);
        assert_eq!(second, 0);

        let transactions =
            get_transactions(user_id, &TransactionFilter::default(), &conn).unwrap();
        assert_eq!(transactions.len(), 3);
    }

    #[test]
    fn materialize_advances_last_materialized() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn);
        create_recurring_expense(
            user_id,
            "Rent",
            900.0,
            "Housing",
            Frequency::Monthly,
            date(2024, 1, 1),
            None,
            None,
            &conn,
        )
        .unwrap();

        materialize_due(user_id, date(2024, 2, 15), &conn).unwrap();

        let templates = get_recurring_expenses(user_id, &conn).unwrap();
        assert_eq!(templates[0].last_materialized, Some(date(2024, 2, 1)));

        // A later read picks up only the occurrences that have come due
        // since.
        let created = materialize_due(user_id, date(2024, 4, 2), &conn).unwrap();
        assert_eq!(created, 2);
    }

    #[test]
    fn materialize_only_touches_the_requesting_user() {
        let conn = get_db_connection();
        let alice = insert_test_user(&conn);
        let bob = create_user(
            "bob",
            "bob@example.com",
            PasswordHash::new_unchecked("$2b$04$not.a.real.hash"),
            &conn,
        )
        .unwrap()
        .id;

        create_recurring_expense(
            bob,
            "Insurance",
            60.0,
            "Insurance",
            Frequency::Monthly,
            date(2024, 1, 5),
            None,
            None,
            &conn,
        )
        .unwrap();

        let created = materialize_due(alice, date(2024, 3, 1), &conn).unwrap();

        assert_eq!(created, 0);
        assert!(
            get_transactions(alice, &TransactionFilter::default(), &conn)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn rejected_end_date_update_leaves_the_template_unchanged() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn);
        let template = create_recurring_expense(
            user_id,
            "Rent",
            1200.0,
            "Housing",
            Frequency::Monthly,
            date(2024, 6, 1),
            None,
            None,
            &conn,
        )
        .unwrap();

        let update = RecurringExpenseUpdate {
            end_date: Some(date(2024, 1, 1)),
            ..Default::default()
        };
        let result = update_recurring_expense(user_id, template.id, &update, &conn);

        assert!(matches!(result, Err(Error::Validation(_))));

        let stored = get_recurring_expense(user_id, template.id, &conn).unwrap();
        assert_eq!(stored.end_date, None);
        assert_eq!(stored.start_date, date(2024, 6, 1));
    }
}

//! The transaction ledger: dated, categorized income/expense records scoped to
//! a user.
//!
//! This module contains the `Transaction` model, the database functions for
//! appending, querying, updating, and deleting ledger entries, and the HTTP
//! route handlers over them.

use std::{fmt::Display, str::FromStr};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use rusqlite::{
    Connection, params_from_iter,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppConfig, AppJson, Error,
    auth::Claims,
    database_id::DatabaseID,
    recurring::materialize_due,
    user::UserID,
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction added money to or removed money from the user's
/// wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

impl TransactionKind {
    /// The kind as the lowercase string stored in the database and sent over
    /// the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            _ => Err(Error::Validation(
                "type must be either 'income' or 'expense'".to_owned(),
            )),
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// The ID of the user that owns this transaction.
    pub user_id: UserID,
    /// Whether this transaction is income or an expense.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The name of the category this transaction belongs to.
    pub category: String,
    /// The amount of money, always positive. The kind carries the sign.
    pub amount: f64,
    /// When the transaction happened.
    pub date: NaiveDate,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
}

// ============================================================================
// DATABASE
// ============================================================================

/// Create the transaction table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                kind TEXT NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                description TEXT
                )",
        (),
    )?;

    Ok(())
}

/// Append a new entry to the ledger of `user_id`.
///
/// The caller should validate `amount` beforehand, see
/// [validate_amount].
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
pub fn create_transaction(
    user_id: UserID,
    kind: TransactionKind,
    category: &str,
    amount: f64,
    date: NaiveDate,
    description: Option<&str>,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection.execute(
        "INSERT INTO \"transaction\" (user_id, kind, category, amount, date, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (user_id.as_i64(), kind, category, amount, date, description),
    )?;

    Ok(Transaction {
        id: connection.last_insert_rowid(),
        user_id,
        kind,
        category: category.to_owned(),
        amount,
        date,
        description: description.map(str::to_owned),
    })
}

fn map_transaction_row(row: &rusqlite::Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        kind: row.get(2)?,
        category: row.get(3)?,
        amount: row.get(4)?,
        date: row.get(5)?,
        description: row.get(6)?,
    })
}

/// How to filter a user's ledger in [get_transactions].
///
/// Filters are conjunctive, an absent filter places no constraint on that
/// field. The date range is a closed interval.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    /// Only include transactions in this category.
    pub category: Option<String>,
    /// Only include transactions of this kind.
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    /// Only include transactions on or after this date.
    pub start_date: Option<NaiveDate>,
    /// Only include transactions on or before this date.
    pub end_date: Option<NaiveDate>,
}

/// Get the transactions of `user_id` matching `filter`, sorted by date
/// descending.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
pub fn get_transactions(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut sql = String::from(
        "SELECT id, user_id, kind, category, amount, date, description
             FROM \"transaction\" WHERE user_id = ?1",
    );
    let mut params: Vec<Value> = vec![Value::from(user_id.as_i64())];

    if let Some(category) = &filter.category {
        params.push(Value::from(category.clone()));
        sql.push_str(&format!(" AND category = ?{}", params.len()));
    }

    if let Some(kind) = filter.kind {
        params.push(Value::from(kind.as_str().to_owned()));
        sql.push_str(&format!(" AND kind = ?{}", params.len()));
    }

    if let Some(start_date) = filter.start_date {
        params.push(Value::from(start_date.to_string()));
        sql.push_str(&format!(" AND date >= ?{}", params.len()));
    }

    if let Some(end_date) = filter.end_date {
        params.push(Value::from(end_date.to_string()));
        sql.push_str(&format!(" AND date <= ?{}", params.len()));
    }

    sql.push_str(" ORDER BY date DESC, id DESC");

    let transactions = connection
        .prepare(&sql)?
        .query_map(params_from_iter(params), |row| map_transaction_row(row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// The fields of a ledger entry that may be changed after it is created.
///
/// The owner of a transaction is immutable.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionUpdate {
    /// The new kind, sent as "income" or "expense".
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// The new category name.
    pub category: Option<String>,
    /// The new amount, must be positive.
    pub amount: Option<f64>,
    /// The new date.
    pub date: Option<NaiveDate>,
    /// The new free-form description.
    pub description: Option<String>,
}

/// Merge `update` into the transaction with `transaction_id` owned by
/// `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no transaction with that ID belongs to
/// `user_id`, [Error::Validation] if the new kind or amount is invalid, or
/// [Error::Sql] if there was an error accessing the database.
pub fn update_transaction(
    user_id: UserID,
    transaction_id: DatabaseID,
    update: &TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let kind = update
        .kind
        .as_deref()
        .map(TransactionKind::from_str)
        .transpose()?;

    if let Some(amount) = update.amount {
        validate_amount(amount)?;
    }

    let rows_updated = connection.execute(
        "UPDATE \"transaction\"
             SET kind = COALESCE(?1, kind),
                 category = COALESCE(?2, category),
                 amount = COALESCE(?3, amount),
                 date = COALESCE(?4, date),
                 description = COALESCE(?5, description)
             WHERE id = ?6 AND user_id = ?7",
        (
            kind,
            update.category.as_deref(),
            update.amount,
            update.date,
            update.description.as_deref(),
            transaction_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    connection
        .prepare(
            "SELECT id, user_id, kind, category, amount, date, description
                 FROM \"transaction\" WHERE id = ?1",
        )?
        .query_row((transaction_id,), |row| map_transaction_row(row))
        .map_err(|error| error.into())
}

/// Delete the transaction with `transaction_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no transaction with that ID belongs to
/// `user_id`, or [Error::Sql] if there was an error accessing the database.
pub fn delete_transaction(
    user_id: UserID,
    transaction_id: DatabaseID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_deleted = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (transaction_id, user_id.as_i64()),
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Check that `amount` is a positive, finite number.
///
/// # Errors
///
/// Returns [Error::Validation] otherwise.
pub fn validate_amount(amount: f64) -> Result<(), Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(Error::Validation(
            "amount must be a positive number".to_owned(),
        ))
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The details sent by the client when appending a ledger entry.
#[derive(Debug, Deserialize)]
pub struct NewTransactionRequest {
    /// "income" or "expense".
    #[serde(rename = "type", default)]
    pub kind: String,
    /// The category name to file the entry under.
    #[serde(default)]
    pub category: String,
    /// The amount of money, must be positive.
    pub amount: f64,
    /// The date the transaction happened.
    pub date: NaiveDate,
    /// An optional free-form description.
    pub description: Option<String>,
}

/// A route handler for appending a new entry to the ledger.
///
/// Responds with 201 and the created record.
///
/// # Errors
///
/// Returns [Error::Validation] if the amount is not a positive number or the
/// kind is not "income" or "expense".
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn create_transaction_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    AppJson(request): AppJson<NewTransactionRequest>,
) -> Result<impl IntoResponse, Error> {
    let kind: TransactionKind = request.kind.parse()?;
    validate_amount(request.amount)?;

    if request.category.is_empty() {
        return Err(Error::Validation("category is required".to_owned()));
    }

    let connection = state.db_connection().lock().unwrap();
    let transaction = create_transaction(
        claims.user_id(),
        kind,
        &request.category,
        request.amount,
        request.date,
        request.description.as_deref(),
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for listing the user's transactions, filtered and sorted
/// by date descending.
///
/// Any recurring expenses that have come due are materialized into the ledger
/// before the list is read, so the response always includes them.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn list_transactions_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = state.db_connection().lock().unwrap();

    materialize_due(claims.user_id(), Utc::now().date_naive(), &connection)?;
    let transactions = get_transactions(claims.user_id(), &filter, &connection)?;

    Ok(Json(transactions))
}

/// A route handler for partially updating a ledger entry.
///
/// # Errors
///
/// Returns [Error::NotFound] if the ID does not refer to a transaction owned
/// by the caller.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn update_transaction_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(transaction_id): Path<DatabaseID>,
    AppJson(update): AppJson<TransactionUpdate>,
) -> Result<Json<Transaction>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let transaction = update_transaction(claims.user_id(), transaction_id, &update, &connection)?;

    Ok(Json(transaction))
}

/// A route handler for deleting a ledger entry.
///
/// # Errors
///
/// Returns [Error::NotFound] if the ID does not refer to a transaction owned
/// by the caller.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn delete_transaction_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(transaction_id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection().lock().unwrap();
    delete_transaction(claims.user_id(), transaction_id, &connection)?;

    Ok(Json(
        serde_json::json!({ "message": "Transaction removed" }),
    ))
}

#[cfg(test)]
mod transaction_tests {
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use crate::{
        PasswordHash,
        user::{UserID, create_user, create_user_table},
    };

    use super::{
        Error, Transaction, TransactionFilter, TransactionKind, TransactionUpdate,
        create_transaction, create_transaction_table, delete_transaction, get_transactions,
        update_transaction, validate_amount,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");
        create_transaction_table(&conn).expect("Could not create transaction table");

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

    fn insert_entry(
        conn: &Connection,
        user_id: UserID,
        kind: TransactionKind,
        category: &str,
        amount: f64,
        on: NaiveDate,
    ) -> Transaction {
        create_transaction(user_id, kind, category, amount, on, None, conn).unwrap()
    }

    #[test]
    fn validate_amount_rejects_zero_and_negative() {
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-10.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(42.5).is_ok());
    }

    #[test]
    fn list_returns_date_descending() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");

        insert_entry(
            &conn,
            user_id,
            TransactionKind::Expense,
            "Food",
            10.0,
            date(2024, 1, 5),
        );
        insert_entry(
            &conn,
            user_id,
            TransactionKind::Income,
            "Salary",
            1000.0,
            date(2024, 1, 20),
        );
        insert_entry(
            &conn,
            user_id,
            TransactionKind::Expense,
            "Rent",
            500.0,
            date(2024, 1, 12),
        );

        let transactions =
            get_transactions(user_id, &TransactionFilter::default(), &conn).unwrap();

        let dates: Vec<NaiveDate> = transactions.iter().map(|t| t.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 20), date(2024, 1, 12), date(2024, 1, 5)]
        );
    }

    #[test]
    fn list_filtered_by_kind_excludes_other_kind() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");

        insert_entry(
            &conn,
            user_id,
            TransactionKind::Income,
            "Salary",
            1000.0,
            date(2024, 1, 1),
        );
        insert_entry(
            &conn,
            user_id,
            TransactionKind::Expense,
            "Food",
            30.0,
            date(2024, 1, 2),
        );

        let filter = TransactionFilter {
            kind: Some(TransactionKind::Income),
            ..Default::default()
        };
        let transactions = get_transactions(user_id, &filter, &conn).unwrap();

        assert_eq!(transactions.len(), 1);
        assert!(
            transactions
                .iter()
                .all(|t| t.kind == TransactionKind::Income)
        );
    }

    #[test]
    fn list_date_range_is_closed_interval() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");

        for day in [1, 10, 20, 31] {
            insert_entry(
                &conn,
                user_id,
                TransactionKind::Expense,
                "Food",
                5.0,
                date(2024, 1, day),
            );
        }

        let filter = TransactionFilter {
            start_date: Some(date(2024, 1, 10)),
            end_date: Some(date(2024, 1, 20)),
            ..Default::default()
        };
        let transactions = get_transactions(user_id, &filter, &conn).unwrap();

        let mut dates: Vec<NaiveDate> = transactions.iter().map(|t| t.date).collect();
        dates.sort();
        assert_eq!(dates, vec![date(2024, 1, 10), date(2024, 1, 20)]);
    }

    #[test]
    fn list_does_not_return_other_users_transactions() {
        let conn = get_db_connection();
        let alice = insert_test_user(&conn, "alice", "alice@example.com");
        let bob = insert_test_user(&conn, "bob", "bob@example.com");

        insert_entry(
            &conn,
            alice,
            TransactionKind::Expense,
            "Food",
            10.0,
            date(2024, 1, 1),
        );

        let transactions = get_transactions(bob, &TransactionFilter::default(), &conn).unwrap();

        assert!(transactions.is_empty());
    }

    #[test]
    fn update_merges_only_given_fields() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        let transaction = insert_entry(
            &conn,
            user_id,
            TransactionKind::Expense,
            "Food",
            10.0,
            date(2024, 1, 1),
        );

        let update = TransactionUpdate {
            amount: Some(25.0),
            ..Default::default()
        };
        let updated = update_transaction(user_id, transaction.id, &update, &conn).unwrap();

        assert_eq!(updated.amount, 25.0);
        assert_eq!(updated.category, "Food");
        assert_eq!(updated.kind, TransactionKind::Expense);
        assert_eq!(updated.date, date(2024, 1, 1));
    }

    #[test]
    fn update_fails_for_other_users_transaction() {
        let conn = get_db_connection();
        let alice = insert_test_user(&conn, "alice", "alice@example.com");
        let bob = insert_test_user(&conn, "bob", "bob@example.com");
        let transaction = insert_entry(
            &conn,
            alice,
            TransactionKind::Expense,
            "Food",
            10.0,
            date(2024, 1, 1),
        );

        let update = TransactionUpdate {
            amount: Some(25.0),
            ..Default::default()
        };
        let result = update_transaction(bob, transaction.id, &update, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn update_rejects_invalid_kind() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        let transaction = insert_entry(
            &conn,
            user_id,
            TransactionKind::Expense,
            "Food",
            10.0,
            date(2024, 1, 1),
        );

        let update = TransactionUpdate {
            kind: Some("transfer".to_owned()),
            ..Default::default()
        };
        let result = update_transaction(user_id, transaction.id, &update, &conn);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn delete_removes_the_entry() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");
        let transaction = insert_entry(
            &conn,
            user_id,
            TransactionKind::Expense,
            "Food",
            10.0,
            date(2024, 1, 1),
        );

        delete_transaction(user_id, transaction.id, &conn).unwrap();

        let transactions =
            get_transactions(user_id, &TransactionFilter::default(), &conn).unwrap();
        assert!(transactions.is_empty());
    }

    #[test]
    fn delete_fails_when_absent() {
        let conn = get_db_connection();
        let user_id = insert_test_user(&conn, "alice", "alice@example.com");

        assert_eq!(
            delete_transaction(user_id, 42, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_fails_for_other_users_transaction() {
        let conn = get_db_connection();
        let alice = insert_test_user(&conn, "alice", "alice@example.com");
        let bob = insert_test_user(&conn, "bob", "bob@example.com");
        let transaction = insert_entry(
            &conn,
            alice,
            TransactionKind::Expense,
            "Food",
            10.0,
            date(2024, 1, 1),
        );

        assert_eq!(
            delete_transaction(bob, transaction.id, &conn),
            Err(Error::NotFound)
        );
    }
}

//! User-defined transaction categories.
//!
//! Transactions reference categories by name, so renaming or deleting a
//! category relabels the owner's matching transactions. Deleting moves them
//! to [UNCATEGORIZED].

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppConfig, AppJson, Error, auth::Claims, database_id::DatabaseID,
    transaction::TransactionKind,
    user::UserID,
};

/// The category name given to transactions whose category was deleted.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A label for grouping transactions, unique per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The ID of the category.
    pub id: DatabaseID,
    /// The ID of the user that owns this category.
    pub user_id: UserID,
    /// The category name, unique among the owner's categories.
    pub name: String,
    /// Whether this category labels income or expenses.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

// ============================================================================
// DATABASE
// ============================================================================

/// Create the category table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                UNIQUE(user_id, name)
                )",
        (),
    )?;

    Ok(())
}

/// Create a new category for `user_id`.
///
/// # Errors
///
/// Returns [Error::DuplicateCategoryName] if the user already has a category
/// with this name, or [Error::Sql] if there was an error accessing the
/// database.
pub fn create_category(
    user_id: UserID,
    name: &str,
    kind: TransactionKind,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (user_id, name, kind) VALUES (?1, ?2, ?3)",
        (user_id.as_i64(), name, kind),
    )?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        user_id,
        name: name.to_owned(),
        kind,
    })
}

/// Get all categories of `user_id`, sorted by name.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    let categories = connection
        .prepare("SELECT id, user_id, name, kind FROM category WHERE user_id = ?1 ORDER BY name")?
        .query_map((user_id.as_i64(),), |row| {
            Ok(Category {
                id: row.get(0)?,
                user_id: UserID::new(row.get(1)?),
                name: row.get(2)?,
                kind: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(categories)
}

/// Rename the category with `category_id` owned by `user_id` and relabel the
/// owner's transactions in the old name.
///
/// # Errors
///
/// Returns [Error::NotFound] if no category with that ID belongs to
/// `user_id`, or [Error::DuplicateCategoryName] if the new name is taken.
pub fn update_category(
    user_id: UserID,
    category_id: DatabaseID,
    new_name: &str,
    connection: &Connection,
) -> Result<Category, Error> {
    let old: Category = connection
        .prepare("SELECT id, user_id, name, kind FROM category WHERE id = ?1 AND user_id = ?2")?
        .query_row((category_id, user_id.as_i64()), |row| {
            Ok(Category {
                id: row.get(0)?,
                user_id: UserID::new(row.get(1)?),
                name: row.get(2)?,
                kind: row.get(3)?,
            })
        })?;

    connection.execute(
        "UPDATE category SET name = ?1 WHERE id = ?2",
        (new_name, category_id),
    )?;

    connection.execute(
        "UPDATE \"transaction\" SET category = ?1 WHERE user_id = ?2 AND category = ?3",
        (new_name, user_id.as_i64(), &old.name),
    )?;

    Ok(Category {
        name: new_name.to_owned(),
        ..old
    })
}

/// Delete the category with `category_id` owned by `user_id` and move the
/// owner's transactions in it to [UNCATEGORIZED].
///
/// # Errors
///
/// Returns [Error::NotFound] if no category with that ID belongs to
/// `user_id`, or [Error::Sql] if there was an error accessing the database.
pub fn delete_category(
    user_id: UserID,
    category_id: DatabaseID,
    connection: &Connection,
) -> Result<(), Error> {
    let name: String = connection
        .prepare("SELECT name FROM category WHERE id = ?1 AND user_id = ?2")?
        .query_row((category_id, user_id.as_i64()), |row| row.get(0))?;

    connection.execute("DELETE FROM category WHERE id = ?1", (category_id,))?;

    connection.execute(
        "UPDATE \"transaction\" SET category = ?1 WHERE user_id = ?2 AND category = ?3",
        (UNCATEGORIZED, user_id.as_i64(), &name),
    )?;

    Ok(())
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The details sent by the client when creating a category.
#[derive(Debug, Deserialize)]
pub struct NewCategoryRequest {
    /// The category name, unique per user.
    #[serde(default)]
    pub name: String,
    /// "income" or "expense".
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A route handler for creating a new category.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn create_category_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    AppJson(request): AppJson<NewCategoryRequest>,
) -> Result<impl IntoResponse, Error> {
    if request.name.is_empty() {
        return Err(Error::Validation("name is required".to_owned()));
    }

    let kind: TransactionKind = request.kind.parse()?;

    let connection = state.db_connection().lock().unwrap();
    let category = create_category(claims.user_id(), &request.name, kind, &connection)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// A route handler for listing the user's categories.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn list_categories_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let categories = get_categories(claims.user_id(), &connection)?;

    Ok(Json(categories))
}

/// The body of a category rename request.
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    /// The new category name.
    #[serde(default)]
    pub name: String,
}

/// A route handler for renaming a category.
///
/// Transactions labelled with the old name are relabelled with the new one.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn update_category_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(category_id): Path<DatabaseID>,
    AppJson(request): AppJson<UpdateCategoryRequest>,
) -> Result<Json<Category>, Error> {
    if request.name.is_empty() {
        return Err(Error::Validation("name is required".to_owned()));
    }

    let connection = state.db_connection().lock().unwrap();
    let category = update_category(claims.user_id(), category_id, &request.name, &connection)?;

    Ok(Json(category))
}

/// A route handler for deleting a category.
///
/// Transactions in the category are moved to [UNCATEGORIZED].
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn delete_category_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(category_id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection().lock().unwrap();
    delete_category(claims.user_id(), category_id, &connection)?;

    Ok(Json(serde_json::json!({ "message": "Category removed" })))
}

//! Savings goals: targets the user contributes towards over time.
//!
//! Nothing moves money into a goal automatically, contributions are explicit
//! mutations. A goal's status flips to completed once its current amount
//! reaches the target.

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

/// How important a goal is to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    /// Nice to have.
    Low,
    /// The default priority.
    Medium,
    /// Should be funded first.
    High,
}

impl GoalPriority {
    /// The priority as the lowercase string stored in the database and sent
    /// over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPriority::Low => "low",
            GoalPriority::Medium => "medium",
            GoalPriority::High => "high",
        }
    }
}

impl FromStr for GoalPriority {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "low" => Ok(GoalPriority::Low),
            "medium" => Ok(GoalPriority::Medium),
            "high" => Ok(GoalPriority::High),
            _ => Err(Error::Validation(
                "priority must be one of 'low', 'medium' or 'high'".to_owned(),
            )),
        }
    }
}

impl ToSql for GoalPriority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for GoalPriority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// Where a goal is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    /// Still being funded.
    Active,
    /// The target has been reached.
    Completed,
    /// Set aside for now.
    Paused,
}

impl GoalStatus {
    /// The status as the lowercase string stored in the database and sent
    /// over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Paused => "paused",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            "paused" => Ok(GoalStatus::Paused),
            _ => Err(Error::Validation(
                "status must be one of 'active', 'completed' or 'paused'".to_owned(),
            )),
        }
    }
}

impl Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for GoalStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for GoalStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// A savings target the user contributes towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// The ID of the goal.
    pub id: DatabaseID,
    /// The ID of the user that owns this goal.
    pub user_id: UserID,
    /// A display name for the goal.
    pub name: String,
    /// An optional longer description.
    pub description: Option<String>,
    /// The amount the user wants to reach.
    pub target_amount: f64,
    /// The amount contributed so far.
    pub current_amount: f64,
    /// The category the goal relates to.
    pub category: String,
    /// How important the goal is.
    pub priority: GoalPriority,
    /// Where the goal is in its lifecycle.
    pub status: GoalStatus,
    /// When the user wants to reach the target.
    pub deadline: NaiveDate,
    /// How much the user plans to contribute each month.
    pub monthly_contribution: f64,
}

impl Goal {
    /// How far along the goal is as a fraction of the target.
    pub fn progress(&self) -> f64 {
        if self.target_amount > 0.0 {
            self.current_amount / self.target_amount
        } else {
            0.0
        }
    }
}

// ============================================================================
// DATABASE
// ============================================================================

/// Create the goal table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_goal_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS goal (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                name TEXT NOT NULL,
                description TEXT,
                target_amount REAL NOT NULL,
                current_amount REAL NOT NULL DEFAULT 0,
                category TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                deadline TEXT NOT NULL,
                monthly_contribution REAL NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

fn map_goal_row(row: &rusqlite::Row) -> Result<Goal, rusqlite::Error> {
    Ok(Goal {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        target_amount: row.get(4)?,
        current_amount: row.get(5)?,
        category: row.get(6)?,
        priority: row.get(7)?,
        status: row.get(8)?,
        deadline: row.get(9)?,
        monthly_contribution: row.get(10)?,
    })
}

const SELECT_GOAL: &str = "SELECT id, user_id, name, description, target_amount, current_amount,
     category, priority, status, deadline, monthly_contribution FROM goal";

/// Create a new goal for `user_id`.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
#[allow(clippy::too_many_arguments)]
pub fn create_goal(
    user_id: UserID,
    name: &str,
    description: Option<&str>,
    target_amount: f64,
    category: &str,
    priority: GoalPriority,
    deadline: NaiveDate,
    monthly_contribution: f64,
    connection: &Connection,
) -> Result<Goal, Error> {
    connection.execute(
        "INSERT INTO goal (user_id, name, description, target_amount, category, priority, deadline, monthly_contribution)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            user_id.as_i64(),
            name,
            description,
            target_amount,
            category,
            priority,
            deadline,
            monthly_contribution,
        ),
    )?;

    get_goal(user_id, connection.last_insert_rowid(), connection)
}

/// Get the goal with `goal_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no goal with that ID belongs to `user_id`.
pub fn get_goal(
    user_id: UserID,
    goal_id: DatabaseID,
    connection: &Connection,
) -> Result<Goal, Error> {
    connection
        .prepare(&format!("{SELECT_GOAL} WHERE id = ?1 AND user_id = ?2"))?
        .query_row((goal_id, user_id.as_i64()), |row| map_goal_row(row))
        .map_err(|error| error.into())
}

/// Get all goals of `user_id`.
///
/// # Errors
///
/// Returns [Error::Sql] if there was an error accessing the database.
pub fn get_goals(user_id: UserID, connection: &Connection) -> Result<Vec<Goal>, Error> {
    let goals = connection
        .prepare(&format!("{SELECT_GOAL} WHERE user_id = ?1 ORDER BY id"))?
        .query_map((user_id.as_i64(),), |row| map_goal_row(row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(goals)
}

/// The fields of a goal that may be changed after it is created.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalUpdate {
    /// The new display name.
    pub name: Option<String>,
    /// The new description.
    pub description: Option<String>,
    /// The new target, must be positive.
    pub target_amount: Option<f64>,
    /// The new category.
    pub category: Option<String>,
    /// The new priority, sent as "low", "medium" or "high".
    pub priority: Option<String>,
    /// The new status, sent as "active", "completed" or "paused".
    pub status: Option<String>,
    /// The new deadline.
    pub deadline: Option<NaiveDate>,
    /// The new planned monthly contribution.
    pub monthly_contribution: Option<f64>,
}

/// Merge `update` into the goal with `goal_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no goal with that ID belongs to `user_id`, or
/// [Error::Validation] if the new priority, status, or target is invalid.
pub fn update_goal(
    user_id: UserID,
    goal_id: DatabaseID,
    update: &GoalUpdate,
    connection: &Connection,
) -> Result<Goal, Error> {
    let priority = update
        .priority
        .as_deref()
        .map(GoalPriority::from_str)
        .transpose()?;
    let status = update
        .status
        .as_deref()
        .map(GoalStatus::from_str)
        .transpose()?;

    if let Some(target_amount) = update.target_amount
        && !(target_amount.is_finite() && target_amount > 0.0)
    {
        return Err(Error::Validation(
            "target amount must be a positive number".to_owned(),
        ));
    }

    let rows_updated = connection.execute(
        "UPDATE goal
             SET name = COALESCE(?1, name),
                 description = COALESCE(?2, description),
                 target_amount = COALESCE(?3, target_amount),
                 category = COALESCE(?4, category),
                 priority = COALESCE(?5, priority),
                 status = COALESCE(?6, status),
                 deadline = COALESCE(?7, deadline),
                 monthly_contribution = COALESCE(?8, monthly_contribution)
             WHERE id = ?9 AND user_id = ?10",
        (
            update.name.as_deref(),
            update.description.as_deref(),
            update.target_amount,
            update.category.as_deref(),
            priority,
            status,
            update.deadline,
            update.monthly_contribution,
            goal_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    get_goal(user_id, goal_id, connection)
}

/// Add `amount` to the goal's current amount, marking it completed once the
/// target is reached.
///
/// # Errors
///
/// Returns [Error::NotFound] if no goal with that ID belongs to `user_id`, or
/// [Error::Validation] if `amount` is not positive.
pub fn contribute_to_goal(
    user_id: UserID,
    goal_id: DatabaseID,
    amount: f64,
    connection: &Connection,
) -> Result<Goal, Error> {
    if !(amount.is_finite() && amount > 0.0) {
        return Err(Error::Validation(
            "contribution amount must be a positive number".to_owned(),
        ));
    }

    let rows_updated = connection.execute(
        "UPDATE goal
             SET current_amount = current_amount + ?1,
                 status = CASE
                     WHEN current_amount + ?1 >= target_amount THEN 'completed'
                     ELSE status
                 END
             WHERE id = ?2 AND user_id = ?3",
        (amount, goal_id, user_id.as_i64()),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    get_goal(user_id, goal_id, connection)
}

/// Delete the goal with `goal_id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no goal with that ID belongs to `user_id`.
pub fn delete_goal(
    user_id: UserID,
    goal_id: DatabaseID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_deleted = connection.execute(
        "DELETE FROM goal WHERE id = ?1 AND user_id = ?2",
        (goal_id, user_id.as_i64()),
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The details sent by the client when creating a goal.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoalRequest {
    /// A display name for the goal.
    #[serde(default)]
    pub name: String,
    /// An optional longer description.
    pub description: Option<String>,
    /// The amount the user wants to reach, must be positive.
    pub target_amount: f64,
    /// The category the goal relates to.
    #[serde(default)]
    pub category: String,
    /// "low", "medium" or "high". Defaults to "medium".
    #[serde(default)]
    pub priority: Option<String>,
    /// When the user wants to reach the target.
    pub deadline: NaiveDate,
    /// How much the user plans to contribute each month.
    #[serde(default)]
    pub monthly_contribution: f64,
}

/// A route handler for creating a new goal.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn create_goal_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    AppJson(request): AppJson<NewGoalRequest>,
) -> Result<impl IntoResponse, Error> {
    if request.name.is_empty() || request.category.is_empty() {
        return Err(Error::Validation(
            "name and category are required".to_owned(),
        ));
    }

    if !(request.target_amount.is_finite() && request.target_amount > 0.0) {
        return Err(Error::Validation(
            "target amount must be a positive number".to_owned(),
        ));
    }

    let priority = match request.priority.as_deref() {
        Some(text) => text.parse()?,
        None => GoalPriority::Medium,
    };

    let connection = state.db_connection().lock().unwrap();
    let goal = create_goal(
        claims.user_id(),
        &request.name,
        request.description.as_deref(),
        request.target_amount,
        &request.category,
        priority,
        request.deadline,
        request.monthly_contribution,
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(goal)))
}

/// A route handler for listing the user's goals.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn list_goals_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<Vec<Goal>>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let goals = get_goals(claims.user_id(), &connection)?;

    Ok(Json(goals))
}

/// A route handler for partially updating a goal.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn update_goal_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(goal_id): Path<DatabaseID>,
    AppJson(update): AppJson<GoalUpdate>,
) -> Result<Json<Goal>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let goal = update_goal(claims.user_id(), goal_id, &update, &connection)?;

    Ok(Json(goal))
}

/// The body of a goal contribution request.
#[derive(Debug, Deserialize)]
pub struct ContributionRequest {
    /// The amount to add, must be positive.
    pub amount: f64,
}

/// A route handler for contributing towards a goal.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn contribute_to_goal_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(goal_id): Path<DatabaseID>,
    AppJson(request): AppJson<ContributionRequest>,
) -> Result<Json<Goal>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let goal = contribute_to_goal(claims.user_id(), goal_id, request.amount, &connection)?;

    Ok(Json(goal))
}

/// A route handler for deleting a goal.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn delete_goal_endpoint(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(goal_id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection().lock().unwrap();
    delete_goal(claims.user_id(), goal_id, &connection)?;

    Ok(Json(serde_json::json!({ "message": "Goal removed" })))
}

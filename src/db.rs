//! Database schema setup.

use rusqlite::Connection;

use crate::{
    budget::create_budget_table, category::create_category_table, goal::create_goal_table,
    recurring::create_recurring_expense_table, transaction::create_transaction_table,
    user::create_user_table,
};

/// Create all the tables the application needs.
///
/// Table creation is idempotent, so this is safe to call on a database that
/// has already been initialized.
///
/// # Errors
///
/// This function will return an error if a SQL query failed.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    let transaction = connection.unchecked_transaction()?;

    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_goal_table(&transaction)?;
    create_recurring_expense_table(&transaction)?;

    transaction.commit()
}

#[cfg(test)]
mod db_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn initialize_creates_all_tables() {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");

        initialize(&conn).expect("Could not initialize database");

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                     ('user', 'category', 'transaction', 'budget', 'goal', 'recurring_expense')",
                (),
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 6);
    }

    #[test]
    fn initialize_is_idempotent() {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");

        initialize(&conn).expect("Could not initialize database");
        initialize(&conn).expect("Second initialization should succeed");
    }
}

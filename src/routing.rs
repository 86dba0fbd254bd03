//! Application router configuration.
//!
//! Authentication is enforced per handler through the [crate::auth::Claims]
//! extractor, so the router itself stays a flat list of routes.

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::{
    AppConfig,
    auth::login,
    budget::{
        budget_alerts_endpoint, create_budget_endpoint, delete_budget_endpoint,
        list_budgets_endpoint, update_budget_endpoint,
    },
    category::{
        create_category_endpoint, delete_category_endpoint, list_categories_endpoint,
        update_category_endpoint,
    },
    endpoints,
    export::{
        export_budgets_endpoint, export_goals_endpoint, export_transactions_endpoint,
        financial_report_endpoint, pdf_report_endpoint,
    },
    goal::{
        contribute_to_goal_endpoint, create_goal_endpoint, delete_goal_endpoint,
        list_goals_endpoint, update_goal_endpoint,
    },
    recurring::{
        create_recurring_expense_endpoint, delete_recurring_expense_endpoint,
        list_recurring_expenses_endpoint, materialize_recurring_expenses_endpoint,
        update_recurring_expense_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, list_transactions_endpoint,
        update_transaction_endpoint,
    },
    user::{change_password, get_profile, register, update_profile},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppConfig) -> Router {
    Router::new()
        .route(endpoints::REGISTER, post(register))
        .route(endpoints::LOG_IN, post(login))
        .route(endpoints::PROFILE, get(get_profile))
        .route(endpoints::PROFILE, put(update_profile))
        .route(endpoints::PASSWORD, put(change_password))
        .route(endpoints::CREATE_CATEGORY, post(create_category_endpoint))
        .route(endpoints::LIST_CATEGORIES, get(list_categories_endpoint))
        .route(endpoints::UPDATE_CATEGORY, put(update_category_endpoint))
        .route(endpoints::DELETE_CATEGORY, delete(delete_category_endpoint))
        .route(
            endpoints::CREATE_TRANSACTION,
            post(create_transaction_endpoint),
        )
        .route(
            endpoints::LIST_TRANSACTIONS,
            get(list_transactions_endpoint),
        )
        .route(
            endpoints::UPDATE_TRANSACTION,
            put(update_transaction_endpoint),
        )
        .route(
            endpoints::DELETE_TRANSACTION,
            delete(delete_transaction_endpoint),
        )
        .route(endpoints::CREATE_BUDGET, post(create_budget_endpoint))
        .route(endpoints::LIST_BUDGETS, get(list_budgets_endpoint))
        .route(endpoints::BUDGET_ALERTS, get(budget_alerts_endpoint))
        .route(endpoints::UPDATE_BUDGET, put(update_budget_endpoint))
        .route(endpoints::DELETE_BUDGET, delete(delete_budget_endpoint))
        .route(endpoints::CREATE_GOAL, post(create_goal_endpoint))
        .route(endpoints::LIST_GOALS, get(list_goals_endpoint))
        .route(endpoints::UPDATE_GOAL, put(update_goal_endpoint))
        .route(
            endpoints::CONTRIBUTE_TO_GOAL,
            post(contribute_to_goal_endpoint),
        )
        .route(endpoints::DELETE_GOAL, delete(delete_goal_endpoint))
        .route(
            endpoints::CREATE_RECURRING,
            post(create_recurring_expense_endpoint),
        )
        .route(
            endpoints::LIST_RECURRING,
            get(list_recurring_expenses_endpoint),
        )
        .route(
            endpoints::UPDATE_RECURRING,
            put(update_recurring_expense_endpoint),
        )
        .route(
            endpoints::DELETE_RECURRING,
            delete(delete_recurring_expense_endpoint),
        )
        .route(
            endpoints::MATERIALIZE_RECURRING,
            post(materialize_recurring_expenses_endpoint),
        )
        .route(
            endpoints::EXPORT_TRANSACTIONS,
            get(export_transactions_endpoint),
        )
        .route(endpoints::EXPORT_BUDGETS, get(export_budgets_endpoint))
        .route(endpoints::EXPORT_GOALS, get(export_goals_endpoint))
        .route(endpoints::FINANCIAL_REPORT, get(financial_report_endpoint))
        .route(endpoints::PDF_REPORT, get(pdf_report_endpoint))
        .with_state(state)
}

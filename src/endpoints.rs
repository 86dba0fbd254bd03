//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g. '/api/v1/goals/update/{id}', use
//! [format_endpoint].

/// The route for creating a new account.
pub const REGISTER: &str = "/api/v1/users/register";
/// The route for logging in and receiving a bearer token.
pub const LOG_IN: &str = "/api/v1/users/login";
/// The route for fetching the user's own identity.
pub const PROFILE: &str = "/api/v1/users/profile";
/// The route for changing the user's password.
pub const PASSWORD: &str = "/api/v1/users/password";

/// The route for creating a category.
pub const CREATE_CATEGORY: &str = "/api/v1/categories/create";
/// The route for listing the user's categories.
pub const LIST_CATEGORIES: &str = "/api/v1/categories/lists";
/// The route for renaming a category.
pub const UPDATE_CATEGORY: &str = "/api/v1/categories/update/{id}";
/// The route for deleting a category.
pub const DELETE_CATEGORY: &str = "/api/v1/categories/delete/{id}";

/// The route for appending to the ledger.
pub const CREATE_TRANSACTION: &str = "/api/v1/transactions/create";
/// The route for listing and filtering the ledger.
pub const LIST_TRANSACTIONS: &str = "/api/v1/transactions/lists";
/// The route for updating a ledger entry.
pub const UPDATE_TRANSACTION: &str = "/api/v1/transactions/update/{id}";
/// The route for deleting a ledger entry.
pub const DELETE_TRANSACTION: &str = "/api/v1/transactions/delete/{id}";

/// The route for creating a budget.
pub const CREATE_BUDGET: &str = "/api/v1/budgets/create";
/// The route for listing the user's budgets.
pub const LIST_BUDGETS: &str = "/api/v1/budgets/lists";
/// The route for listing budgets that have crossed their alert threshold.
pub const BUDGET_ALERTS: &str = "/api/v1/budgets/alerts";
/// The route for updating a budget.
pub const UPDATE_BUDGET: &str = "/api/v1/budgets/update/{id}";
/// The route for deactivating a budget.
pub const DELETE_BUDGET: &str = "/api/v1/budgets/delete/{id}";

/// The route for creating a goal.
pub const CREATE_GOAL: &str = "/api/v1/goals/create";
/// The route for listing the user's goals.
pub const LIST_GOALS: &str = "/api/v1/goals/lists";
/// The route for updating a goal.
pub const UPDATE_GOAL: &str = "/api/v1/goals/update/{id}";
/// The route for contributing towards a goal.
pub const CONTRIBUTE_TO_GOAL: &str = "/api/v1/goals/contribute/{id}";
/// The route for deleting a goal.
pub const DELETE_GOAL: &str = "/api/v1/goals/delete/{id}";

/// The route for creating a recurring expense template.
pub const CREATE_RECURRING: &str = "/api/v1/recurring/create";
/// The route for listing the user's recurring expense templates.
pub const LIST_RECURRING: &str = "/api/v1/recurring/lists";
/// The route for updating a recurring expense template.
pub const UPDATE_RECURRING: &str = "/api/v1/recurring/update/{id}";
/// The route for deleting a recurring expense template.
pub const DELETE_RECURRING: &str = "/api/v1/recurring/delete/{id}";
/// The route for materializing due recurring expenses on demand.
pub const MATERIALIZE_RECURRING: &str = "/api/v1/recurring/materialize";

/// The route for exporting the ledger as CSV.
pub const EXPORT_TRANSACTIONS: &str = "/api/v1/export/transactions";
/// The route for exporting active budgets as CSV.
pub const EXPORT_BUDGETS: &str = "/api/v1/export/budgets";
/// The route for exporting goals as CSV.
pub const EXPORT_GOALS: &str = "/api/v1/export/goals";
/// The route for the aggregated JSON financial report.
pub const FINANCIAL_REPORT: &str = "/api/v1/export/financial-report";
/// The route for downloading the PDF report.
pub const PDF_REPORT: &str = "/api/v1/export/pdf-report";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace. For
/// example, in the endpoint path '/api/v1/goals/update/{id}', '{id}' is the
/// parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

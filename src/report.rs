//! Pure report building: ledger summaries, CSV rendering and the PDF report.
//!
//! Everything in this module works over already-loaded rows, the route
//! handlers in [crate::export] do the database access.

use chrono::NaiveDate;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde::Serialize;

use crate::{Error, budget::Budget, goal::Goal, transaction::Transaction};

/// Totals over a set of ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    /// The sum of all income entries.
    pub total_income: f64,
    /// The sum of all expense entries.
    pub total_expenses: f64,
    /// Income minus expenses.
    pub net_savings: f64,
    /// Net savings as a percentage of income, zero when there is no income.
    pub savings_rate: f64,
}

/// Sum up `transactions` into income, expenses, and the savings rate.
///
/// The summary is linear: summarizing two disjoint date ranges and adding the
/// totals gives the same figures as summarizing their union.
pub fn summarize(transactions: &[Transaction]) -> FinancialSummary {
    let mut total_income = 0.0;
    let mut total_expenses = 0.0;

    for transaction in transactions {
        match transaction.kind {
            crate::transaction::TransactionKind::Income => total_income += transaction.amount,
            crate::transaction::TransactionKind::Expense => total_expenses += transaction.amount,
        }
    }

    let net_savings = total_income - total_expenses;
    let savings_rate = if total_income > 0.0 {
        net_savings / total_income * 100.0
    } else {
        0.0
    };

    FinancialSummary {
        total_income,
        total_expenses,
        net_savings,
        savings_rate,
    }
}

fn write_csv<F>(headers: &[&str], write_rows: F) -> Result<String, Error>
where
    F: FnOnce(&mut csv::Writer<Vec<u8>>) -> Result<(), csv::Error>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(headers)
        .and_then(|()| write_rows(&mut writer))
        .map_err(|error| Error::Csv(error.to_string()))?;

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::Csv(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| Error::Csv(error.to_string()))
}

/// Render `transactions` as CSV text, one row per ledger entry.
///
/// # Errors
///
/// Returns [Error::Csv] if a row could not be written.
pub fn transactions_to_csv(transactions: &[Transaction]) -> Result<String, Error> {
    write_csv(
        &["id", "type", "category", "amount", "date", "description"],
        |writer| {
            for transaction in transactions {
                writer.write_record([
                    transaction.id.to_string(),
                    transaction.kind.to_string(),
                    transaction.category.clone(),
                    transaction.amount.to_string(),
                    transaction.date.to_string(),
                    transaction.description.clone().unwrap_or_default(),
                ])?;
            }

            Ok(())
        },
    )
}

/// Render `budgets` as CSV text.
///
/// # Errors
///
/// Returns [Error::Csv] if a row could not be written.
pub fn budgets_to_csv(budgets: &[Budget]) -> Result<String, Error> {
    write_csv(
        &[
            "id", "name", "category", "amount", "spent", "remaining", "period", "startDate",
            "endDate",
        ],
        |writer| {
            for budget in budgets {
                writer.write_record([
                    budget.id.to_string(),
                    budget.name.clone(),
                    budget.category.clone(),
                    budget.amount.to_string(),
                    budget.spent.to_string(),
                    (budget.amount - budget.spent).to_string(),
                    budget.period.to_string(),
                    budget.start_date.to_string(),
                    budget.end_date.to_string(),
                ])?;
            }

            Ok(())
        },
    )
}

/// Render `goals` as CSV text.
///
/// # Errors
///
/// Returns [Error::Csv] if a row could not be written.
pub fn goals_to_csv(goals: &[Goal]) -> Result<String, Error> {
    write_csv(
        &[
            "id",
            "name",
            "targetAmount",
            "currentAmount",
            "progressPercent",
            "category",
            "priority",
            "status",
            "deadline",
        ],
        |writer| {
            for goal in goals {
                writer.write_record([
                    goal.id.to_string(),
                    goal.name.clone(),
                    goal.target_amount.to_string(),
                    goal.current_amount.to_string(),
                    format!("{:.1}", goal.progress() * 100.0),
                    goal.category.clone(),
                    goal.priority.as_str().to_owned(),
                    goal.status.to_string(),
                    goal.deadline.to_string(),
                ])?;
            }

            Ok(())
        },
    )
}

/// How many of the most recent transactions the PDF report lists.
const PDF_RECENT_TRANSACTIONS: usize = 10;

/// Render the financial summary and the most recent transactions as a
/// single-page PDF.
///
/// # Errors
///
/// Returns [Error::Pdf] if the document could not be built.
pub fn render_pdf_report(
    summary: &FinancialSummary,
    transactions: &[Transaction],
    report_date: NaiveDate,
) -> Result<Vec<u8>, Error> {
    let (document, page, layer) =
        PdfDocument::new("Financial Report", Mm(210.0), Mm(297.0), "Layer 1");
    let font = document
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|error| Error::Pdf(error.to_string()))?;
    let bold = document
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|error| Error::Pdf(error.to_string()))?;

    let layer = document.get_page(page).get_layer(layer);
    let mut cursor = Mm(270.0);

    layer.use_text("Financial Report", 20.0, Mm(20.0), cursor, &bold);
    cursor -= Mm(8.0);
    layer.use_text(
        format!("Generated on {report_date}"),
        10.0,
        Mm(20.0),
        cursor,
        &font,
    );
    cursor -= Mm(14.0);

    let summary_lines = [
        format!("Total income: {:.2}", summary.total_income),
        format!("Total expenses: {:.2}", summary.total_expenses),
        format!("Net savings: {:.2}", summary.net_savings),
        format!("Savings rate: {:.1}%", summary.savings_rate),
    ];

    for line in summary_lines {
        layer.use_text(line, 12.0, Mm(20.0), cursor, &font);
        cursor -= Mm(7.0);
    }

    cursor -= Mm(7.0);
    layer.use_text("Recent transactions", 14.0, Mm(20.0), cursor, &bold);
    cursor -= Mm(8.0);

    for transaction in transactions.iter().take(PDF_RECENT_TRANSACTIONS) {
        let line = format!(
            "{}  {}  {}  {:.2}",
            transaction.date, transaction.kind, transaction.category, transaction.amount
        );
        layer.use_text(line, 10.0, Mm(20.0), cursor, &font);
        cursor -= Mm(6.0);
    }

    document
        .save_to_bytes()
        .map_err(|error| Error::Pdf(error.to_string()))
}

#[cfg(test)]
mod report_tests {
    use chrono::NaiveDate;

    use crate::{
        transaction::{Transaction, TransactionKind},
        user::UserID,
    };

    use super::{render_pdf_report, summarize, transactions_to_csv};

    fn transaction(kind: TransactionKind, amount: f64, category: &str) -> Transaction {
        Transaction {
            id: 1,
            user_id: UserID::new(1),
            kind,
            category: category.to_owned(),
            amount,
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            description: None,
        }
    }

    #[test]
    fn summary_reports_savings_rate_as_a_percentage() {
        let transactions = vec![
            transaction(TransactionKind::Income, 1000.0, "Salary"),
            transaction(TransactionKind::Expense, 300.0, "Groceries"),
        ];

        let summary = summarize(&transactions);

        assert_eq!(summary.total_income, 1000.0);
        assert_eq!(summary.total_expenses, 300.0);
        assert_eq!(summary.net_savings, 700.0);
        assert_eq!(summary.savings_rate, 70.0);
    }

    #[test]
    fn summary_of_empty_ledger_is_all_zero() {
        let summary = summarize(&[]);

        assert_eq!(summary.total_income, 0.0);
        assert_eq!(summary.total_expenses, 0.0);
        assert_eq!(summary.net_savings, 0.0);
        assert_eq!(summary.savings_rate, 0.0);
    }

    #[test]
    fn summary_is_linear_over_disjoint_ranges() {
        let march = vec![
            transaction(TransactionKind::Income, 1200.0, "Salary"),
            transaction(TransactionKind::Expense, 400.0, "Rent"),
        ];
        let april = vec![
            transaction(TransactionKind::Income, 800.0, "Freelance"),
            transaction(TransactionKind::Expense, 150.0, "Groceries"),
        ];
        let combined: Vec<_> = march.iter().chain(april.iter()).cloned().collect();

        let split_income = summarize(&march).total_income + summarize(&april).total_income;
        let split_expenses = summarize(&march).total_expenses + summarize(&april).total_expenses;
        let whole = summarize(&combined);

        assert_eq!(whole.total_income, split_income);
        assert_eq!(whole.total_expenses, split_expenses);
    }

    #[test]
    fn csv_quotes_fields_containing_the_delimiter() {
        let mut entry = transaction(TransactionKind::Expense, 25.5, "Food, drink");
        entry.description = Some("Dinner, with friends".to_owned());

        let csv_text = transactions_to_csv(&[entry]).unwrap();

        assert!(csv_text.contains("\"Food, drink\""));
        assert!(csv_text.contains("\"Dinner, with friends\""));

        // The rendered text must read back as the same single record.
        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let records: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][2], "Food, drink");
        assert_eq!(&records[0][5], "Dinner, with friends");
    }

    #[test]
    fn csv_starts_with_the_header_row() {
        let csv_text = transactions_to_csv(&[]).unwrap();

        assert_eq!(
            csv_text.lines().next(),
            Some("id,type,category,amount,date,description")
        );
    }

    #[test]
    fn pdf_report_is_a_valid_pdf_document() {
        let transactions = vec![
            transaction(TransactionKind::Income, 1000.0, "Salary"),
            transaction(TransactionKind::Expense, 300.0, "Groceries"),
        ];
        let summary = summarize(&transactions);

        let bytes = render_pdf_report(
            &summary,
            &transactions,
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap();

        assert!(bytes.starts_with(b"%PDF"));
    }
}

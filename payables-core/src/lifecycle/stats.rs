use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::bill::{Bill, BillStatus};

/// Days ahead (inclusive) counted as "upcoming".
pub const UPCOMING_WINDOW_DAYS: u64 = 7;

/// Aggregates over one tenant's bills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillStatistics {
    /// Remaining balance of pending, overdue and partially paid bills.
    pub total_pending_amount: Decimal,
    pub overdue_count: usize,
    pub overdue_amount: Decimal,
    pub paid_today: usize,
    pub upcoming_count: usize,
}

impl BillStatistics {
    /// Computes the statistics for `bills` as of `today`.
    ///
    /// The caller is responsible for passing a single tenant's bills.
    pub fn compute<'a, I>(bills: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = &'a Bill>,
    {
        let horizon = today
            .checked_add_days(Days::new(UPCOMING_WINDOW_DAYS))
            .unwrap_or(NaiveDate::MAX);

        bills.into_iter().fold(BillStatistics::default(), |mut stats, bill| {
            let open = bill.status.is_open();

            if open {
                stats.total_pending_amount += bill.remaining_balance();
            }

            if bill.status == BillStatus::Overdue || bill.is_overdue(today) {
                stats.overdue_count += 1;
                stats.overdue_amount += bill.remaining_balance();
            }

            if bill.status == BillStatus::Paid && bill.payment_date == Some(today) {
                stats.paid_today += 1;
            }

            if open && bill.due_date >= today && bill.due_date <= horizon {
                stats.upcoming_count += 1;
            }

            stats
        })
    }
}

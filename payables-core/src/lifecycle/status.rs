use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

use crate::models::bill::{Bill, BillStatus};
use crate::validation;

/// Side effect that accompanies a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Set the payment date to today if it is still unset.
    StampPaymentDate,

    /// Nothing besides the status itself.
    None,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::StampPaymentDate => write!(f, "stamp_payment_date"),
            Effect::None => write!(f, "none"),
        }
    }
}

/// Rules that turn a bill's amounts and dates into its status.
///
/// Implementations are pure: they read the bill and `today` and never touch
/// storage, so every rule can be tested in isolation.
pub trait Transition {
    /// Determines the next status and the effect to apply with it.
    fn transition(bill: &Bill, today: NaiveDate) -> (BillStatus, Effect);

    /// Applies [`Transition::transition`] to `bill` in place.
    fn apply(bill: &mut Bill, today: NaiveDate) {
        let (status, effect) = Self::transition(bill, today);
        bill.status = status;
        if effect == Effect::StampPaymentDate && bill.payment_date.is_none() {
            bill.payment_date = Some(today);
        }
    }
}

/// Status derivation run on every create and update.
///
/// Evaluated in order:
/// 1. paid > 0 and paid >= final amount -> paid (stamp payment date)
/// 2. paid > 0 -> partially paid
/// 3. pending and due date before today -> overdue
/// 4. otherwise unchanged (cancelled, or pending and not yet due)
pub struct DerivationRules;

impl Transition for DerivationRules {
    fn transition(bill: &Bill, today: NaiveDate) -> (BillStatus, Effect) {
        if bill.amount_paid > Decimal::ZERO {
            if bill.amount_paid >= bill.final_amount() {
                (BillStatus::Paid, Effect::StampPaymentDate)
            } else {
                (BillStatus::PartiallyPaid, Effect::None)
            }
        } else if bill.status == BillStatus::Pending && bill.due_date < today {
            (BillStatus::Overdue, Effect::None)
        } else {
            (bill.status, Effect::None)
        }
    }
}

/// Status rule of the record-payment operation.
///
/// Anything short of the final amount goes back to pending, even for a bill
/// that was overdue or partially paid. This un-overdues bills and is kept
/// deliberately; see the `record_payment` tests.
pub struct PaymentRules;

impl Transition for PaymentRules {
    fn transition(bill: &Bill, _today: NaiveDate) -> (BillStatus, Effect) {
        if bill.amount_paid >= bill.final_amount() {
            (BillStatus::Paid, Effect::StampPaymentDate)
        } else {
            (BillStatus::Pending, Effect::None)
        }
    }
}

/// Pure status derivation: `(bill, today) -> status`.
pub fn derive_status(bill: &Bill, today: NaiveDate) -> BillStatus {
    DerivationRules::transition(bill, today).0
}

/// Uppercases the free-text fields stored on a bill.
pub fn normalize_text(bill: &mut Bill) {
    validation::uppercase(&mut bill.description);
    validation::uppercase(&mut bill.invoice_numbers);
    validation::uppercase(&mut bill.notes);
}

/// Normalization applied to every bill before it is written.
pub fn normalize_and_derive(mut bill: Bill, today: NaiveDate) -> Bill {
    normalize_text(&mut bill);
    DerivationRules::apply(&mut bill, today);
    bill
}

/// Records a payment amount (and optionally its date) on `bill`.
///
/// `amount_paid` must already be a validated, non-negative decimal.
pub fn apply_payment(
    mut bill: Bill,
    amount_paid: Decimal,
    payment_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Bill {
    bill.amount_paid = amount_paid;
    if payment_date.is_some() {
        bill.payment_date = payment_date;
    }
    normalize_text(&mut bill);
    PaymentRules::apply(&mut bill, today);
    bill
}

/// Unconditional cancellation; idempotent.
pub fn cancel(mut bill: Bill) -> Bill {
    bill.status = BillStatus::Cancelled;
    bill
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bill::fixtures::{amount, bill, date};

    #[test]
    fn test_full_payment_marks_paid_and_stamps_date() {
        let mut b = bill();
        b.amount_paid = amount("100.00");
        let b = normalize_and_derive(b, date(2025, 1, 10));
        assert_eq!(b.status, BillStatus::Paid);
        assert_eq!(b.payment_date, Some(date(2025, 1, 10)));
    }

    #[test]
    fn test_full_payment_keeps_existing_payment_date() {
        let mut b = bill();
        b.amount_paid = amount("120.00");
        b.payment_date = Some(date(2025, 1, 5));
        let b = normalize_and_derive(b, date(2025, 1, 10));
        assert_eq!(b.status, BillStatus::Paid);
        assert_eq!(b.payment_date, Some(date(2025, 1, 5)));
    }

    #[test]
    fn test_final_amount_includes_interest_and_penalty() {
        let mut b = bill();
        b.interest = amount("5.00");
        b.penalty = amount("2.00");
        b.amount_paid = amount("100.00");
        assert_eq!(derive_status(&b, date(2025, 1, 10)), BillStatus::PartiallyPaid);

        b.discount = amount("7.00");
        assert_eq!(derive_status(&b, date(2025, 1, 10)), BillStatus::Paid);
    }

    #[test]
    fn test_partial_payment() {
        let mut b = bill();
        b.amount_paid = amount("0.01");
        assert_eq!(derive_status(&b, date(2025, 3, 1)), BillStatus::PartiallyPaid);
    }

    #[test]
    fn test_pending_past_due_becomes_overdue() {
        let b = bill();
        assert_eq!(derive_status(&b, date(2025, 2, 1)), BillStatus::Overdue);
        assert_eq!(derive_status(&b, date(2025, 1, 31)), BillStatus::Pending);
    }

    #[test]
    fn test_cancelled_is_not_overwritten_by_overdue_rule() {
        let mut b = bill();
        b.status = BillStatus::Cancelled;
        assert_eq!(derive_status(&b, date(2026, 1, 1)), BillStatus::Cancelled);
    }

    #[test]
    fn test_normalize_uppercases_text() {
        let mut b = bill();
        b.notes = "pay via pix".to_string();
        b.invoice_numbers = "12, 34".to_string();
        let b = normalize_and_derive(b, date(2025, 1, 1));
        assert_eq!(b.description, "OFFICE RENT");
        assert_eq!(b.notes, "PAY VIA PIX");
        assert_eq!(b.invoice_numbers, "12, 34");
    }

    #[test]
    fn test_payment_rule_reverts_overdue_to_pending() {
        let mut b = bill();
        b.status = BillStatus::Overdue;
        let b = apply_payment(b, amount("30.00"), None, date(2025, 3, 1));
        assert_eq!(b.status, BillStatus::Pending);
        assert_eq!(b.payment_date, None);
    }

    #[test]
    fn test_payment_rule_full_amount() {
        let b = apply_payment(bill(), amount("100.00"), None, date(2025, 1, 20));
        assert_eq!(b.status, BillStatus::Paid);
        assert_eq!(b.payment_date, Some(date(2025, 1, 20)));

        let b = apply_payment(bill(), amount("100.00"), Some(date(2025, 1, 15)), date(2025, 1, 20));
        assert_eq!(b.payment_date, Some(date(2025, 1, 15)));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut b = bill();
        b.amount_paid = amount("100.00");
        b.status = BillStatus::Paid;
        let once = cancel(b);
        assert_eq!(once.status, BillStatus::Cancelled);
        let twice = cancel(once);
        assert_eq!(twice.status, BillStatus::Cancelled);
    }
}

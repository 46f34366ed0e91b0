use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::{PayablesError, Result};
use crate::money;
use crate::recurrence::Frequency;
use crate::validation;

/// Bill status enumeration.
///
/// Only `Cancelled` is ever set directly by a caller; every other value is
/// derived from the amounts and dates of the bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum BillStatus {
    Pending,
    Overdue,
    Paid,
    PartiallyPaid,
    Cancelled,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Overdue => "overdue",
            BillStatus::Paid => "paid",
            BillStatus::PartiallyPaid => "partially_paid",
            BillStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses that still carry an outstanding balance.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            BillStatus::Pending | BillStatus::Overdue | BillStatus::PartiallyPaid
        )
    }

    /// Listing rank: overdue first, then pending, then everything else.
    pub fn sort_rank(&self) -> u8 {
        match self {
            BillStatus::Overdue => 1,
            BillStatus::Pending => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = PayablesError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(BillStatus::Pending),
            "overdue" => Ok(BillStatus::Overdue),
            "paid" => Ok(BillStatus::Paid),
            "partially_paid" => Ok(BillStatus::PartiallyPaid),
            "cancelled" => Ok(BillStatus::Cancelled),
            other => Err(PayablesError::validation(
                "status",
                format!("unknown status `{}`", other),
            )),
        }
    }
}

/// A payable owed by a company to a supplier.
///
/// Maps to the `bills` table. `final_amount` and friends are never stored;
/// they are recomputed from the four monetary components on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Bill {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub supplier_id: Uuid,
    pub category_id: Uuid,
    pub payment_method_id: Option<Uuid>,

    pub description: String,

    pub original_amount: Decimal,
    pub discount: Decimal,
    pub interest: Decimal,
    pub penalty: Decimal,
    pub amount_paid: Decimal,

    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,

    pub status: BillStatus,

    pub is_installment: bool,
    pub installment_number: i32,
    pub installment_count: i32,
    /// Shared by every sibling of an installment plan or recurrence group.
    pub group_id: Option<Uuid>,

    pub is_recurring: bool,
    pub recurrence_frequency: Option<Frequency>,

    /// Comma separated invoice numbers.
    pub invoice_numbers: String,
    /// Payment-slip number, digits only.
    pub boleto_number: String,
    pub notes: String,

    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// original - discount + interest + penalty, in exact decimal arithmetic.
    pub fn final_amount(&self) -> Decimal {
        self.original_amount - self.discount + self.interest + self.penalty
    }

    /// Outstanding balance; never negative.
    pub fn remaining_balance(&self) -> Decimal {
        (self.final_amount() - self.amount_paid).max(Decimal::ZERO)
    }

    /// Share of the final amount already paid, as a percentage.
    ///
    /// Zero when the final amount is not positive.
    pub fn percent_paid(&self) -> Decimal {
        let final_amount = self.final_amount();
        if final_amount > Decimal::ZERO {
            money::round(self.amount_paid / final_amount * Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        }
    }

    /// Still marked pending although the due date has passed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == BillStatus::Pending && self.due_date < today
    }
}

/// Bill creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBill {
    pub branch_id: Uuid,
    pub supplier_id: Uuid,
    pub category_id: Uuid,
    #[serde(default)]
    pub payment_method_id: Option<Uuid>,
    pub description: String,
    pub original_amount: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub interest: Decimal,
    #[serde(default)]
    pub penalty: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_installment: bool,
    #[serde(default)]
    pub installment_number: Option<i32>,
    #[serde(default)]
    pub installment_count: Option<i32>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub is_recurring: bool,
    /// Free text; unknown names are treated as no frequency.
    #[serde(default)]
    pub recurrence_frequency: Option<String>,
    #[serde(default)]
    pub invoice_numbers: String,
    #[serde(default)]
    pub boleto_number: String,
    #[serde(default)]
    pub notes: String,
}

impl CreateBill {
    /// Shape checks that need no storage access.
    pub fn validate(&self) -> Result<()> {
        validation::required_text("description", &self.description, 200)?;
        validation::max_length_uppercased("description", self.description.trim(), 200)?;
        validate_amounts(
            self.original_amount,
            self.discount,
            self.interest,
            self.penalty,
            self.amount_paid,
        )?;
        validate_installments(self.installment_number, self.installment_count)?;
        validation::invoice_numbers("invoice_numbers", &self.invoice_numbers)?;
        validation::max_length("invoice_numbers", &self.invoice_numbers, 200)?;
        validation::digits_only("boleto_number", &self.boleto_number)?;
        validation::max_length("boleto_number", &self.boleto_number, 100)?;
        Ok(())
    }

    /// Frequency parsed leniently from the free-text field.
    pub fn frequency(&self) -> Option<Frequency> {
        self.recurrence_frequency.as_deref().and_then(Frequency::parse)
    }

    /// Materializes a new, not yet normalized, pending bill.
    pub fn into_bill(self, ctx: &TenantContext, now: DateTime<Utc>) -> Bill {
        let frequency = self.frequency();
        Bill {
            id: Uuid::new_v4(),
            company_id: ctx.company_id,
            branch_id: self.branch_id,
            supplier_id: self.supplier_id,
            category_id: self.category_id,
            payment_method_id: self.payment_method_id,
            description: self.description.trim().to_string(),
            original_amount: money::round(self.original_amount),
            discount: money::round(self.discount),
            interest: money::round(self.interest),
            penalty: money::round(self.penalty),
            amount_paid: money::round(self.amount_paid),
            issue_date: self.issue_date.unwrap_or_else(|| now.date_naive()),
            due_date: self.due_date,
            payment_date: self.payment_date,
            status: BillStatus::Pending,
            is_installment: self.is_installment,
            installment_number: self.installment_number.unwrap_or(1),
            installment_count: self.installment_count.unwrap_or(1),
            group_id: self.group_id,
            is_recurring: self.is_recurring,
            recurrence_frequency: frequency,
            invoice_numbers: self.invoice_numbers,
            boleto_number: self.boleto_number,
            notes: self.notes,
            created_by: Some(ctx.user_id),
            updated_by: Some(ctx.user_id),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Keeps an explicit `null` (`Some(None)`) apart from an absent field
/// (`None`, through `#[serde(default)]`).
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Bill update request. Absent fields are left untouched.
///
/// The branch and the status are not editable here: the branch is fixed at
/// creation and the status is derived (or set through cancel). The nullable
/// columns take `null` to clear them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBill {
    pub supplier_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub payment_method_id: Option<Option<Uuid>>,
    pub description: Option<String>,
    pub original_amount: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub interest: Option<Decimal>,
    pub penalty: Option<Decimal>,
    pub amount_paid: Option<Decimal>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub payment_date: Option<Option<NaiveDate>>,
    pub is_installment: Option<bool>,
    pub installment_number: Option<i32>,
    pub installment_count: Option<i32>,
    pub is_recurring: Option<bool>,
    pub recurrence_frequency: Option<String>,
    pub invoice_numbers: Option<String>,
    pub boleto_number: Option<String>,
    pub notes: Option<String>,
}

impl UpdateBill {
    /// Applies the present fields to `bill` and re-validates the result.
    pub fn apply_to(self, bill: &mut Bill, ctx: &TenantContext, now: DateTime<Utc>) -> Result<()> {
        if let Some(v) = self.supplier_id {
            bill.supplier_id = v;
        }
        if let Some(v) = self.category_id {
            bill.category_id = v;
        }
        if let Some(v) = self.payment_method_id {
            bill.payment_method_id = v;
        }
        if let Some(v) = self.description {
            bill.description = v.trim().to_string();
        }
        if let Some(v) = self.original_amount {
            bill.original_amount = money::round(v);
        }
        if let Some(v) = self.discount {
            bill.discount = money::round(v);
        }
        if let Some(v) = self.interest {
            bill.interest = money::round(v);
        }
        if let Some(v) = self.penalty {
            bill.penalty = money::round(v);
        }
        if let Some(v) = self.amount_paid {
            bill.amount_paid = money::round(v);
        }
        if let Some(v) = self.issue_date {
            bill.issue_date = v;
        }
        if let Some(v) = self.due_date {
            bill.due_date = v;
        }
        if let Some(v) = self.payment_date {
            bill.payment_date = v;
        }
        if let Some(v) = self.is_installment {
            bill.is_installment = v;
        }
        if let Some(v) = self.installment_number {
            bill.installment_number = v;
        }
        if let Some(v) = self.installment_count {
            bill.installment_count = v;
        }
        if let Some(v) = self.is_recurring {
            bill.is_recurring = v;
        }
        if let Some(v) = self.recurrence_frequency {
            bill.recurrence_frequency = Frequency::parse(&v);
        }
        if let Some(v) = self.invoice_numbers {
            bill.invoice_numbers = v;
        }
        if let Some(v) = self.boleto_number {
            bill.boleto_number = v;
        }
        if let Some(v) = self.notes {
            bill.notes = v;
        }
        bill.updated_by = Some(ctx.user_id);
        bill.updated_at = now;

        validation::required_text("description", &bill.description, 200)?;
        validation::max_length_uppercased("description", &bill.description, 200)?;
        validate_amounts(
            bill.original_amount,
            bill.discount,
            bill.interest,
            bill.penalty,
            bill.amount_paid,
        )?;
        validate_installments(Some(bill.installment_number), Some(bill.installment_count))?;
        validation::invoice_numbers("invoice_numbers", &bill.invoice_numbers)?;
        validation::max_length("invoice_numbers", &bill.invoice_numbers, 200)?;
        validation::digits_only("boleto_number", &bill.boleto_number)?;
        validation::max_length("boleto_number", &bill.boleto_number, 100)?;
        Ok(())
    }
}

fn validate_amounts(
    original: Decimal,
    discount: Decimal,
    interest: Decimal,
    penalty: Decimal,
    paid: Decimal,
) -> Result<()> {
    let original = money::check_amount("original_amount", original)?;
    if original < Decimal::new(1, money::SCALE) {
        return Err(PayablesError::validation(
            "original_amount",
            "must be at least 0.01",
        ));
    }
    money::check_amount("discount", discount)?;
    money::check_amount("interest", interest)?;
    money::check_amount("penalty", penalty)?;
    money::check_amount("amount_paid", paid)?;
    Ok(())
}

fn validate_installments(number: Option<i32>, count: Option<i32>) -> Result<()> {
    if number.is_some_and(|n| n < 1) {
        return Err(PayablesError::validation("installment_number", "must be at least 1"));
    }
    if count.is_some_and(|c| c < 1) {
        return Err(PayablesError::validation("installment_count", "must be at least 1"));
    }
    Ok(())
}

/// Bill response: stored fields plus the values derived on read.
#[derive(Debug, Clone, Serialize)]
pub struct BillView {
    #[serde(flatten)]
    pub bill: Bill,
    pub final_amount: Decimal,
    pub remaining_balance: Decimal,
    pub percent_paid: Decimal,
    pub is_overdue: bool,
}

impl BillView {
    pub fn new(bill: Bill, today: NaiveDate) -> Self {
        BillView {
            final_amount: bill.final_amount(),
            remaining_balance: bill.remaining_balance(),
            percent_paid: bill.percent_paid(),
            is_overdue: bill.is_overdue(today),
            bill,
        }
    }
}

/// Optional filters for listing a tenant's bills.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillFilter {
    pub status: Option<BillStatus>,
    pub branch_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub is_installment: Option<bool>,
    pub is_recurring: Option<bool>,
}

impl BillFilter {
    pub fn by_status(status: BillStatus) -> Self {
        BillFilter {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn matches(&self, bill: &Bill) -> bool {
        self.status.map_or(true, |s| bill.status == s)
            && self.branch_id.map_or(true, |id| bill.branch_id == id)
            && self.supplier_id.map_or(true, |id| bill.supplier_id == id)
            && self.category_id.map_or(true, |id| bill.category_id == id)
            && self.is_installment.map_or(true, |v| bill.is_installment == v)
            && self.is_recurring.map_or(true, |v| bill.is_recurring == v)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn amount(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// A pending bill of 100.00 due on 2025-01-31.
    pub fn bill() -> Bill {
        let now = Utc::now();
        Bill {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            payment_method_id: None,
            description: "Office rent".to_string(),
            original_amount: amount("100.00"),
            discount: Decimal::ZERO,
            interest: Decimal::ZERO,
            penalty: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            issue_date: date(2025, 1, 1),
            due_date: date(2025, 1, 31),
            payment_date: None,
            status: BillStatus::Pending,
            is_installment: false,
            installment_number: 1,
            installment_count: 1,
            group_id: None,
            is_recurring: false,
            recurrence_frequency: None,
            invoice_numbers: String::new(),
            boleto_number: String::new(),
            notes: String::new(),
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

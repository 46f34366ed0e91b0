//! Persistence seam for bills and the reference registry.
//!
//! Every tenant-facing method takes the caller's `company_id` and applies it
//! as part of the lookup itself; a record owned by another company is
//! indistinguishable from one that does not exist.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Bill, BillFilter, BillStatus, Branch, Category, PaymentMethod, Supplier};

pub mod memory;
pub mod postgres;

pub use memory::MemoryBillStore;
pub use postgres::PgBillStore;

#[async_trait]
pub trait BillStore: Clone + Send + Sync + 'static {
    /// Inserts a new bill and returns it as stored.
    async fn insert_bill(&self, bill: &Bill) -> Result<Bill>;

    /// Overwrites an existing bill of `bill.company_id`.
    ///
    /// Fails with `NotFound` when no such bill exists in that company.
    async fn update_bill(&self, bill: &Bill) -> Result<Bill>;

    /// Moves a bill to `status` only if the stored row still has the status
    /// and `amount_paid` of `snapshot`. No other column is overwritten;
    /// `payment_date`, when given, only fills an empty one.
    ///
    /// Returns `false` when the row changed since `snapshot` was read.
    async fn set_status_if_unchanged(
        &self,
        snapshot: &Bill,
        status: BillStatus,
        payment_date: Option<NaiveDate>,
    ) -> Result<bool>;

    async fn find_bill(&self, company_id: Uuid, bill_id: Uuid) -> Result<Option<Bill>>;

    /// Bills of one company, overdue first, then pending, then the rest,
    /// each group by ascending due date.
    async fn list_bills(&self, company_id: Uuid, filter: &BillFilter) -> Result<Vec<Bill>>;

    /// Pending bills due before `today`, across all companies, oldest first.
    ///
    /// System maintenance only; never reachable from a tenant request.
    async fn list_stale_pending(&self, today: NaiveDate, limit: i64) -> Result<Vec<Bill>>;

    async fn insert_branch(&self, branch: &Branch) -> Result<Branch>;
    async fn find_branch(&self, company_id: Uuid, branch_id: Uuid) -> Result<Option<Branch>>;
    /// Branches of one company ordered by name. The same goes for the other
    /// registry listings.
    async fn list_branches(&self, company_id: Uuid) -> Result<Vec<Branch>>;

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<Supplier>;
    async fn find_supplier(&self, company_id: Uuid, supplier_id: Uuid) -> Result<Option<Supplier>>;
    async fn list_suppliers(&self, company_id: Uuid) -> Result<Vec<Supplier>>;

    async fn insert_category(&self, category: &Category) -> Result<Category>;
    async fn find_category(&self, company_id: Uuid, category_id: Uuid) -> Result<Option<Category>>;
    async fn list_categories(&self, company_id: Uuid) -> Result<Vec<Category>>;

    async fn insert_payment_method(&self, method: &PaymentMethod) -> Result<PaymentMethod>;
    async fn find_payment_method(
        &self,
        company_id: Uuid,
        method_id: Uuid,
    ) -> Result<Option<PaymentMethod>>;
    async fn list_payment_methods(&self, company_id: Uuid) -> Result<Vec<PaymentMethod>>;

    /// Connectivity check.
    async fn ping(&self) -> Result<()>;
}

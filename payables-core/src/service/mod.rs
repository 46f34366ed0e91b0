//! Logical operations of the payables core.
//!
//! Every operation takes the caller's [`TenantContext`] explicitly. Lookups
//! are scoped to `ctx.company_id` inside the store, so a record owned by
//! another company is reported exactly like a missing one.

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::{PayablesError, Result};
use crate::lifecycle::{self, BillStatistics};
use crate::models::{
    Bill, BillFilter, BillStatus, Branch, Category, CategoryKind, CreateBill, CreateBranch,
    CreateCategory, CreatePaymentMethod, CreateSupplier, PaymentMethod, Supplier, UpdateBill,
};
use crate::money;
use crate::recurrence::{self, Frequency};
use crate::store::BillStore;


/// Accounts-payable operations over a [`BillStore`].
#[derive(Clone)]
pub struct PayablesService<S> {
    store: S,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl<S: BillStore> PayablesService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a single bill.
    ///
    /// The input is validated and every referenced record is resolved inside
    /// the caller's company before anything is written. The bill is then
    /// normalized and its status derived.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed fields or references that do not
    /// resolve in the caller's company.
    #[instrument(skip_all, fields(company_id = %ctx.company_id))]
    pub async fn create_bill(&self, ctx: &TenantContext, input: CreateBill) -> Result<Bill> {
        input.validate()?;
        self.check_references(
            ctx,
            input.branch_id,
            input.supplier_id,
            input.category_id,
            input.payment_method_id,
        )
        .await?;
        warn_unknown_frequency(input.recurrence_frequency.as_deref());

        let bill = lifecycle::normalize_and_derive(input.into_bill(ctx, Utc::now()), today());
        let bill = self.store.insert_bill(&bill).await?;

        info!(bill_id = %bill.id, status = %bill.status, "Bill created");
        Ok(bill)
    }

    /// Creates a recurrence group of `count` bills from one template.
    ///
    /// Degenerates to [`create_bill`](Self::create_bill) when `count` is 1 or
    /// the template is not flagged recurring. Otherwise every sibling gets
    /// the same fresh group id and is written one at a time.
    ///
    /// # Errors
    ///
    /// * `Validation` - detected before the first write; nothing persisted.
    /// * `PartialBatch` - a write failed part way; the siblings already
    ///   written stay persisted and are listed in the error.
    #[instrument(skip_all, fields(company_id = %ctx.company_id, count = count))]
    pub async fn expand_recurring(
        &self,
        ctx: &TenantContext,
        template: CreateBill,
        count: u32,
    ) -> Result<Vec<Bill>> {
        if count == 0 {
            return Err(PayablesError::validation("recurrence_count", "must be at least 1"));
        }
        if count == 1 || !template.is_recurring {
            return Ok(vec![self.create_bill(ctx, template).await?]);
        }

        template.validate()?;
        self.check_references(
            ctx,
            template.branch_id,
            template.supplier_id,
            template.category_id,
            template.payment_method_id,
        )
        .await?;
        warn_unknown_frequency(template.recurrence_frequency.as_deref());

        let frequency = template.frequency();
        let group_id = Uuid::new_v4();
        let template = template.into_bill(ctx, Utc::now());
        let siblings = recurrence::plan(&template, frequency, count, group_id)?;

        let today = today();
        let requested = siblings.len();
        let mut created = Vec::with_capacity(requested);
        for sibling in siblings {
            let sibling = lifecycle::normalize_and_derive(sibling, today);
            match self.store.insert_bill(&sibling).await {
                Ok(bill) => created.push(bill),
                Err(e) => {
                    warn!(
                        group_id = %group_id,
                        created = created.len(),
                        requested,
                        "Recurrence expansion interrupted: {}", e
                    );
                    return Err(PayablesError::PartialBatch {
                        created: created.len(),
                        requested,
                        created_ids: created.iter().map(|b: &Bill| b.id).collect(),
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(group_id = %group_id, created = created.len(), "Recurrence group created");
        Ok(created)
    }

    /// Records a payment on a bill.
    ///
    /// `amount` may be a JSON string, integer or float; it is converted to an
    /// exact two-digit decimal. When absent the bill's final amount is used.
    ///
    /// Paying at least the final amount marks the bill paid (stamping today
    /// unless a payment date is known). Any smaller amount puts the bill back
    /// to pending, including bills that were overdue.
    #[instrument(skip_all, fields(company_id = %ctx.company_id, bill_id = %bill_id))]
    pub async fn record_payment(
        &self,
        ctx: &TenantContext,
        bill_id: Uuid,
        amount: Option<&Value>,
        payment_date: Option<NaiveDate>,
    ) -> Result<Bill> {
        let amount = amount
            .map(|v| money::coerce_amount("amount_paid", v))
            .transpose()?;

        let mut bill = self.load_bill(ctx, bill_id).await?;
        let amount = amount.unwrap_or_else(|| bill.final_amount());
        bill.updated_by = Some(ctx.user_id);

        let bill = lifecycle::apply_payment(bill, amount, payment_date, today());
        let bill = self.store.update_bill(&bill).await?;

        info!(status = %bill.status, "Payment recorded");
        Ok(bill)
    }

    /// Cancels a bill whatever its current status. Idempotent.
    #[instrument(skip_all, fields(company_id = %ctx.company_id, bill_id = %bill_id))]
    pub async fn cancel(&self, ctx: &TenantContext, bill_id: Uuid) -> Result<Bill> {
        let mut bill = self.load_bill(ctx, bill_id).await?;
        bill.updated_by = Some(ctx.user_id);
        let bill = self.store.update_bill(&lifecycle::cancel(bill)).await?;

        info!("Bill cancelled");
        Ok(bill)
    }

    pub async fn get_bill(&self, ctx: &TenantContext, bill_id: Uuid) -> Result<Bill> {
        self.load_bill(ctx, bill_id).await
    }

    /// Applies a partial update, re-validates and re-derives the status.
    #[instrument(skip_all, fields(company_id = %ctx.company_id, bill_id = %bill_id))]
    pub async fn update_bill(
        &self,
        ctx: &TenantContext,
        bill_id: Uuid,
        changes: UpdateBill,
    ) -> Result<Bill> {
        let mut bill = self.load_bill(ctx, bill_id).await?;
        warn_unknown_frequency(changes.recurrence_frequency.as_deref());
        changes.apply_to(&mut bill, ctx, Utc::now())?;
        self.check_references(
            ctx,
            bill.branch_id,
            bill.supplier_id,
            bill.category_id,
            bill.payment_method_id,
        )
        .await?;

        let bill = lifecycle::normalize_and_derive(bill, today());
        let bill = self.store.update_bill(&bill).await?;

        info!(status = %bill.status, "Bill updated");
        Ok(bill)
    }

    pub async fn list_bills(&self, ctx: &TenantContext, filter: &BillFilter) -> Result<Vec<Bill>> {
        self.store.list_bills(ctx.company_id, filter).await
    }

    pub async fn list_by_status(&self, ctx: &TenantContext, status: BillStatus) -> Result<Vec<Bill>> {
        self.list_bills(ctx, &BillFilter::by_status(status)).await
    }

    /// Aggregates over every bill of the caller's company as of today.
    #[instrument(skip_all, fields(company_id = %ctx.company_id))]
    pub async fn statistics(&self, ctx: &TenantContext) -> Result<BillStatistics> {
        let bills = self
            .store
            .list_bills(ctx.company_id, &BillFilter::default())
            .await?;
        Ok(BillStatistics::compute(&bills, today()))
    }

    #[instrument(skip_all, fields(company_id = %ctx.company_id))]
    pub async fn create_branch(&self, ctx: &TenantContext, input: CreateBranch) -> Result<Branch> {
        let branch = input.into_branch(ctx, Utc::now())?;
        let branch = self.store.insert_branch(&branch).await?;
        info!(branch_id = %branch.id, "Branch created");
        Ok(branch)
    }

    #[instrument(skip_all, fields(company_id = %ctx.company_id))]
    pub async fn create_supplier(&self, ctx: &TenantContext, input: CreateSupplier) -> Result<Supplier> {
        let supplier = input.into_supplier(ctx, Utc::now())?;
        let supplier = self.store.insert_supplier(&supplier).await?;
        info!(supplier_id = %supplier.id, "Supplier created");
        Ok(supplier)
    }

    #[instrument(skip_all, fields(company_id = %ctx.company_id))]
    pub async fn create_category(&self, ctx: &TenantContext, input: CreateCategory) -> Result<Category> {
        let category = input.into_category(ctx, Utc::now())?;
        let category = self.store.insert_category(&category).await?;
        info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    #[instrument(skip_all, fields(company_id = %ctx.company_id))]
    pub async fn create_payment_method(
        &self,
        ctx: &TenantContext,
        input: CreatePaymentMethod,
    ) -> Result<PaymentMethod> {
        let method = input.into_payment_method(ctx, Utc::now())?;
        let method = self.store.insert_payment_method(&method).await?;
        info!(payment_method_id = %method.id, "Payment method created");
        Ok(method)
    }

    pub async fn list_branches(&self, ctx: &TenantContext) -> Result<Vec<Branch>> {
        self.store.list_branches(ctx.company_id).await
    }

    pub async fn list_suppliers(&self, ctx: &TenantContext) -> Result<Vec<Supplier>> {
        self.store.list_suppliers(ctx.company_id).await
    }

    pub async fn list_categories(&self, ctx: &TenantContext) -> Result<Vec<Category>> {
        self.store.list_categories(ctx.company_id).await
    }

    pub async fn list_payment_methods(&self, ctx: &TenantContext) -> Result<Vec<PaymentMethod>> {
        self.store.list_payment_methods(ctx.company_id).await
    }

    async fn load_bill(&self, ctx: &TenantContext, bill_id: Uuid) -> Result<Bill> {
        self.store
            .find_bill(ctx.company_id, bill_id)
            .await?
            .ok_or_else(|| PayablesError::not_found("Bill", bill_id))
    }

    /// Every reference must resolve inside the caller's company.
    async fn check_references(
        &self,
        ctx: &TenantContext,
        branch_id: Uuid,
        supplier_id: Uuid,
        category_id: Uuid,
        payment_method_id: Option<Uuid>,
    ) -> Result<()> {
        let company_id = ctx.company_id;

        if self.store.find_branch(company_id, branch_id).await?.is_none() {
            return Err(PayablesError::validation("branch_id", "branch not found"));
        }
        if self.store.find_supplier(company_id, supplier_id).await?.is_none() {
            return Err(PayablesError::validation("supplier_id", "supplier not found"));
        }
        match self.store.find_category(company_id, category_id).await? {
            None => return Err(PayablesError::validation("category_id", "category not found")),
            Some(c) if c.kind != CategoryKind::Expense => {
                return Err(PayablesError::validation(
                    "category_id",
                    "bills require an expense category",
                ))
            }
            Some(_) => {}
        }
        if let Some(method_id) = payment_method_id {
            if self
                .store
                .find_payment_method(company_id, method_id)
                .await?
                .is_none()
            {
                return Err(PayablesError::validation(
                    "payment_method_id",
                    "payment method not found",
                ));
            }
        }
        Ok(())
    }
}

fn warn_unknown_frequency(raw: Option<&str>) {
    if let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) {
        if let Err(e) = raw.parse::<Frequency>() {
            warn!("{}; due dates will not advance", e);
        }
    }
}

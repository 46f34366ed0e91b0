use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{PayablesError, Result};
use crate::models::{Bill, BillFilter, BillStatus, Branch, Category, PaymentMethod, Supplier};
use crate::store::BillStore;

#[derive(Default)]
struct Tables {
    bills: HashMap<Uuid, Bill>,
    branches: HashMap<Uuid, Branch>,
    suppliers: HashMap<Uuid, Supplier>,
    categories: HashMap<Uuid, Category>,
    payment_methods: HashMap<Uuid, PaymentMethod>,
}

/// In-process store with the same tenant scoping and uniqueness rules as
/// the Postgres schema. Used by tests and local runs without a database.
#[derive(Clone, Default)]
pub struct MemoryBillStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn owned_by<T: Clone>(
    map: &HashMap<Uuid, T>,
    company_id: Uuid,
    owner: impl Fn(&T) -> Uuid,
    name: impl Fn(&T) -> &str,
) -> Vec<T> {
    let mut rows: Vec<T> = map
        .values()
        .filter(|row| owner(row) == company_id)
        .cloned()
        .collect();
    rows.sort_by(|a, b| name(a).cmp(name(b)));
    rows
}

fn scoped<T: Clone>(
    map: &HashMap<Uuid, T>,
    id: Uuid,
    company_id: Uuid,
    owner: impl Fn(&T) -> Uuid,
) -> Option<T> {
    map.get(&id).filter(|row| owner(row) == company_id).cloned()
}

#[async_trait]
impl BillStore for MemoryBillStore {
    async fn insert_bill(&self, bill: &Bill) -> Result<Bill> {
        let mut tables = self.tables.write().await;
        tables.bills.insert(bill.id, bill.clone());
        Ok(bill.clone())
    }

    async fn update_bill(&self, bill: &Bill) -> Result<Bill> {
        let mut tables = self.tables.write().await;
        let row = tables
            .bills
            .get_mut(&bill.id)
            .filter(|row| row.company_id == bill.company_id)
            .ok_or_else(|| PayablesError::not_found("Bill", bill.id))?;

        // branch, tenant and creation metadata are immutable
        let updated = Bill {
            branch_id: row.branch_id,
            company_id: row.company_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: Utc::now(),
            ..bill.clone()
        };
        *row = updated.clone();
        Ok(updated)
    }

    async fn set_status_if_unchanged(
        &self,
        snapshot: &Bill,
        status: BillStatus,
        payment_date: Option<NaiveDate>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let row = match tables.bills.get_mut(&snapshot.id) {
            Some(row)
                if row.company_id == snapshot.company_id
                    && row.status == snapshot.status
                    && row.amount_paid == snapshot.amount_paid =>
            {
                row
            }
            _ => return Ok(false),
        };

        row.status = status;
        if row.payment_date.is_none() {
            row.payment_date = payment_date;
        }
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_bill(&self, company_id: Uuid, bill_id: Uuid) -> Result<Option<Bill>> {
        let tables = self.tables.read().await;
        Ok(scoped(&tables.bills, bill_id, company_id, |b| b.company_id))
    }

    async fn list_bills(&self, company_id: Uuid, filter: &BillFilter) -> Result<Vec<Bill>> {
        let tables = self.tables.read().await;
        let mut bills: Vec<Bill> = tables
            .bills
            .values()
            .filter(|b| b.company_id == company_id && filter.matches(b))
            .cloned()
            .collect();
        bills.sort_by(|a, b| {
            a.status
                .sort_rank()
                .cmp(&b.status.sort_rank())
                .then(a.due_date.cmp(&b.due_date))
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(bills)
    }

    async fn list_stale_pending(&self, today: NaiveDate, limit: i64) -> Result<Vec<Bill>> {
        let tables = self.tables.read().await;
        let mut bills: Vec<Bill> = tables
            .bills
            .values()
            .filter(|b| b.status == BillStatus::Pending && b.due_date < today)
            .cloned()
            .collect();
        bills.sort_by_key(|b| b.due_date);
        bills.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(bills)
    }

    async fn insert_branch(&self, branch: &Branch) -> Result<Branch> {
        let mut tables = self.tables.write().await;
        if tables
            .branches
            .values()
            .any(|b| b.company_id == branch.company_id && b.cnpj == branch.cnpj)
        {
            return Err(PayablesError::validation(
                "cnpj",
                "a branch with this CNPJ already exists in this company",
            ));
        }
        tables.branches.insert(branch.id, branch.clone());
        Ok(branch.clone())
    }

    async fn find_branch(&self, company_id: Uuid, branch_id: Uuid) -> Result<Option<Branch>> {
        let tables = self.tables.read().await;
        Ok(scoped(&tables.branches, branch_id, company_id, |b| b.company_id))
    }

    async fn list_branches(&self, company_id: Uuid) -> Result<Vec<Branch>> {
        let tables = self.tables.read().await;
        Ok(owned_by(&tables.branches, company_id, |b| b.company_id, |b| b.name.as_str()))
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<Supplier> {
        let mut tables = self.tables.write().await;
        tables.suppliers.insert(supplier.id, supplier.clone());
        Ok(supplier.clone())
    }

    async fn find_supplier(&self, company_id: Uuid, supplier_id: Uuid) -> Result<Option<Supplier>> {
        let tables = self.tables.read().await;
        Ok(scoped(&tables.suppliers, supplier_id, company_id, |s| s.company_id))
    }

    async fn list_suppliers(&self, company_id: Uuid) -> Result<Vec<Supplier>> {
        let tables = self.tables.read().await;
        Ok(owned_by(&tables.suppliers, company_id, |s| s.company_id, |s| s.name.as_str()))
    }

    async fn insert_category(&self, category: &Category) -> Result<Category> {
        let mut tables = self.tables.write().await;
        if tables.categories.values().any(|c| {
            c.company_id == category.company_id && c.name == category.name && c.kind == category.kind
        }) {
            return Err(PayablesError::validation(
                "name",
                "a category with this name and kind already exists",
            ));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(category.clone())
    }

    async fn find_category(&self, company_id: Uuid, category_id: Uuid) -> Result<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(scoped(&tables.categories, category_id, company_id, |c| c.company_id))
    }

    async fn list_categories(&self, company_id: Uuid) -> Result<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(owned_by(&tables.categories, company_id, |c| c.company_id, |c| c.name.as_str()))
    }

    async fn insert_payment_method(&self, method: &PaymentMethod) -> Result<PaymentMethod> {
        let mut tables = self.tables.write().await;
        if tables
            .payment_methods
            .values()
            .any(|m| m.company_id == method.company_id && m.name == method.name)
        {
            return Err(PayablesError::validation(
                "name",
                "a payment method with this name already exists",
            ));
        }
        tables.payment_methods.insert(method.id, method.clone());
        Ok(method.clone())
    }

    async fn find_payment_method(
        &self,
        company_id: Uuid,
        method_id: Uuid,
    ) -> Result<Option<PaymentMethod>> {
        let tables = self.tables.read().await;
        Ok(scoped(&tables.payment_methods, method_id, company_id, |m| m.company_id))
    }

    async fn list_payment_methods(&self, company_id: Uuid) -> Result<Vec<PaymentMethod>> {
        let tables = self.tables.read().await;
        Ok(owned_by(&tables.payment_methods, company_id, |m| m.company_id, |m| m.name.as_str()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::Result;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum PersonKind {
    Individual,
    Company,
}

/// A party the company owes money to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub trade_name: String,
    pub person_kind: PersonKind,
    /// CPF (11 digits) or CNPJ (14 digits); may be empty.
    pub tax_id: String,
    pub state_registration: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub notes: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSupplier {
    pub name: String,
    #[serde(default)]
    pub trade_name: String,
    pub person_kind: PersonKind,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub state_registration: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub notes: String,
}

impl CreateSupplier {
    pub fn into_supplier(self, ctx: &TenantContext, now: DateTime<Utc>) -> Result<Supplier> {
        validation::required_text("name", &self.name, 200)?;
        validation::max_length("phone", &self.phone, 20)?;
        validation::max_length("postal_code", &self.postal_code, 10)?;
        let tax_id = validation::cpf_or_cnpj("tax_id", &self.tax_id)?;
        let state_registration = validation::strip_non_digits(&self.state_registration);

        let mut supplier = Supplier {
            id: Uuid::new_v4(),
            company_id: ctx.company_id,
            name: self.name.trim().to_string(),
            trade_name: self.trade_name,
            person_kind: self.person_kind,
            tax_id,
            state_registration,
            email: self.email,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            notes: self.notes,
            is_active: true,
            created_by: Some(ctx.user_id),
            updated_by: Some(ctx.user_id),
            created_at: now,
            updated_at: now,
        };
        for (field, value, max_chars) in [
            ("name", &mut supplier.name, 200),
            ("trade_name", &mut supplier.trade_name, 200),
            ("email", &mut supplier.email, 254),
            ("address", &mut supplier.address, 255),
            ("city", &mut supplier.city, 100),
            ("state", &mut supplier.state, 2),
        ] {
            validation::uppercase_within(field, value, max_chars)?;
        }
        validation::uppercase(&mut supplier.notes);
        Ok(supplier)
    }
}

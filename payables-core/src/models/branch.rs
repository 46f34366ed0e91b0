use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::Result;
use crate::validation;

/// A sub-unit of a company that originates bills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Branch {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    /// 14 digits, unique per company.
    pub cnpj: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub phone: String,
    pub email: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBranch {
    pub name: String,
    pub cnpj: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CreateBranch {
    /// Validates, strips the CNPJ down to digits and uppercases text fields.
    pub fn into_branch(self, ctx: &TenantContext, now: DateTime<Utc>) -> Result<Branch> {
        validation::required_text("name", &self.name, 100)?;
        let cnpj = validation::cnpj("cnpj", &self.cnpj)?;
        validation::max_length("phone", &self.phone, 20)?;

        let mut branch = Branch {
            id: Uuid::new_v4(),
            company_id: ctx.company_id,
            name: self.name.trim().to_string(),
            cnpj,
            address: self.address,
            city: self.city,
            state: self.state,
            phone: self.phone,
            email: self.email,
            is_active: self.is_active,
            created_by: Some(ctx.user_id),
            updated_by: Some(ctx.user_id),
            created_at: now,
            updated_at: now,
        };
        for (field, value, max_chars) in [
            ("name", &mut branch.name, 100),
            ("address", &mut branch.address, 255),
            ("city", &mut branch.city, 100),
            ("state", &mut branch.state, 2),
            ("email", &mut branch.email, 254),
        ] {
            validation::uppercase_within(field, value, max_chars)?;
        }
        Ok(branch)
    }
}

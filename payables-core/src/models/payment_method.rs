use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::Result;
use crate::validation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentMethod {
    pub name: String,
}

impl CreatePaymentMethod {
    pub fn into_payment_method(self, ctx: &TenantContext, now: DateTime<Utc>) -> Result<PaymentMethod> {
        validation::required_text("name", &self.name, 100)?;
        let mut name = self.name.trim().to_string();
        validation::uppercase_within("name", &mut name, 100)?;
        Ok(PaymentMethod {
            id: Uuid::new_v4(),
            company_id: ctx.company_id,
            name,
            is_active: true,
            created_by: Some(ctx.user_id),
            updated_by: Some(ctx.user_id),
            created_at: now,
            updated_at: now,
        })
    }
}

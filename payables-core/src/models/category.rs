use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::Result;
use crate::validation;

/// Whether a category books income or expenses. Bills only accept expense categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum CategoryKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub kind: CategoryKind,
    pub color: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    pub kind: CategoryKind,
    #[serde(default)]
    pub color: Option<String>,
}

impl CreateCategory {
    pub fn into_category(self, ctx: &TenantContext, now: DateTime<Utc>) -> Result<Category> {
        validation::required_text("name", &self.name, 100)?;
        let color = self.color.unwrap_or_else(|| "#6B7280".to_string());
        validation::hex_color("color", &color)?;

        let mut name = self.name.trim().to_string();
        validation::uppercase_within("name", &mut name, 100)?;
        Ok(Category {
            id: Uuid::new_v4(),
            company_id: ctx.company_id,
            name,
            kind: self.kind,
            color,
            is_active: true,
            created_by: Some(ctx.user_id),
            updated_by: Some(ctx.user_id),
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PayablesError;

    fn input(name: &str) -> CreateCategory {
        CreateCategory {
            name: name.to_string(),
            kind: CategoryKind::Expense,
            color: None,
        }
    }

    #[test]
    fn test_category_defaults() {
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());
        let category = input("  aluguel ").into_category(&ctx, Utc::now()).unwrap();
        assert_eq!(category.name, "ALUGUEL");
        assert_eq!(category.color, "#6B7280");
        assert_eq!(category.company_id, ctx.company_id);
    }

    #[test]
    fn test_name_limit_counts_uppercased_text() {
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());
        let err = input(&"ß".repeat(60)).into_category(&ctx, Utc::now()).unwrap_err();
        assert!(matches!(err, PayablesError::Validation { ref field, .. } if field == "name"));
    }
}

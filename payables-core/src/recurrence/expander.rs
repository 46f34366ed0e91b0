use uuid::Uuid;

use crate::error::{PayablesError, Result};
use crate::models::bill::Bill;
use crate::recurrence::frequency::{advance, Frequency};
use crate::validation;

/// Upper bound on siblings generated by one expansion.
pub const MAX_RECURRENCES: u32 = 360;

/// Builds the ordered siblings of one recurrence group from `template`.
///
/// Sibling `i` (0-based) is due `advance(template.due_date, frequency, i)`,
/// is described as `"<description> (i+1/count)"`, carries `group_id`, and is
/// flagged recurring. Everything else, including tenant, branch, supplier,
/// category, payment method and every amount, is copied from the template.
///
/// Nothing is persisted here; every sibling is validated up front so a
/// malformed group is rejected before the first write.
pub fn plan(
    template: &Bill,
    frequency: Option<Frequency>,
    count: u32,
    group_id: Uuid,
) -> Result<Vec<Bill>> {
    if count == 0 {
        return Err(PayablesError::validation(
            "recurrence_count",
            "must be at least 1",
        ));
    }
    if count > MAX_RECURRENCES {
        return Err(PayablesError::validation(
            "recurrence_count",
            format!("must be at most {}", MAX_RECURRENCES),
        ));
    }

    (0..count)
        .map(|i| {
            let due_date = advance(template.due_date, frequency, i).ok_or_else(|| {
                PayablesError::validation("due_date", "recurrence runs past the supported calendar")
            })?;
            let description = format!("{} ({}/{})", template.description, i + 1, count);
            validation::max_length_uppercased("description", &description, 200)?;

            Ok(Bill {
                id: Uuid::new_v4(),
                description,
                due_date,
                group_id: Some(group_id),
                is_recurring: true,
                recurrence_frequency: frequency,
                ..template.clone()
            })
        })
        .collect()
}

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::generator::PlanProjection;
use crate::billing::domain::{BillingMonth, BillingPlanItem, PlanItemCategory, PlanItemId};

/// Suggested line annotated with its difference from the persisted plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffedItem {
    pub billing_month: BillingMonth,
    pub category: PlanItemCategory,
    pub amount: Decimal,
    pub is_prorated: bool,
    pub description: String,
    pub existing_item_id: Option<PlanItemId>,
    pub existing_amount: Option<Decimal>,
    pub is_different: bool,
    pub diff_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDiff {
    pub current_total: Decimal,
    pub suggested_total: Decimal,
    pub items: Vec<DiffedItem>,
    /// Persisted lines whose (month, category) no longer appears in the projection.
    pub removed_items: Vec<BillingPlanItem>,
}

impl PlanDiff {
    pub fn has_changes(&self) -> bool {
        !self.removed_items.is_empty() || self.items.iter().any(|item| item.is_different)
    }
}

/// Match suggested lines to persisted ones by `(billing month, category)`.
///
/// When several persisted lines share a key, the first in month/category order
/// is the match and the rest are reported as removed.
pub fn diff_against(existing: &[&BillingPlanItem], projection: &PlanProjection) -> PlanDiff {
    let mut by_key: BTreeMap<(BillingMonth, PlanItemCategory), &BillingPlanItem> = BTreeMap::new();
    for item in existing {
        by_key
            .entry((item.billing_month, item.category))
            .or_insert(*item);
    }

    let mut matched: BTreeSet<PlanItemId> = BTreeSet::new();
    let items = projection
        .items
        .iter()
        .map(|suggested| {
            match by_key.get(&(suggested.billing_month, suggested.category)) {
                Some(current) => {
                    matched.insert(current.id.clone());
                    DiffedItem {
                        billing_month: suggested.billing_month,
                        category: suggested.category,
                        amount: suggested.amount,
                        is_prorated: suggested.is_prorated,
                        description: suggested.description.clone(),
                        existing_item_id: Some(current.id.clone()),
                        existing_amount: Some(current.amount),
                        is_different: current.amount != suggested.amount,
                        diff_amount: suggested.amount - current.amount,
                    }
                }
                None => DiffedItem {
                    billing_month: suggested.billing_month,
                    category: suggested.category,
                    amount: suggested.amount,
                    is_prorated: suggested.is_prorated,
                    description: suggested.description.clone(),
                    existing_item_id: None,
                    existing_amount: None,
                    is_different: true,
                    diff_amount: suggested.amount,
                },
            }
        })
        .collect();

    let removed_items = existing
        .iter()
        .filter(|item| !matched.contains(&item.id))
        .map(|item| (*item).clone())
        .collect();

    PlanDiff {
        current_total: existing.iter().map(|item| item.amount).sum(),
        suggested_total: projection.total(),
        items,
        removed_items,
    }
}

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::billing::domain::{round_amount, BillingMonth, LodgingAssignment, PlanItemCategory};
use crate::billing::error::BillingError;
use crate::config::{BillingConfig, HEALTH_CHECK_MILESTONES};

/// Days in the conventional billing month used for proration.
const PRORATION_DAYS: u32 = 30;

/// Facts about a placement that drive its fee projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementFacts {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub monthly_service_fee: Decimal,
    pub passport_expiry: Option<NaiveDate>,
    pub lodging: Option<LodgingAssignment>,
}

/// One projected charge, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedItem {
    pub billing_month: BillingMonth,
    pub category: PlanItemCategory,
    pub amount: Decimal,
    pub is_prorated: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProjection {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items: Vec<ProjectedItem>,
}

impl PlanProjection {
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|item| item.amount).sum()
    }
}

/// Stateless projector turning placement facts into an ordered fee schedule.
#[derive(Debug, Clone)]
pub struct PlanGenerator {
    config: BillingConfig,
}

impl PlanGenerator {
    pub fn new(config: BillingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn project(&self, facts: &PlacementFacts) -> Result<PlanProjection, BillingError> {
        let end_date = self.resolve_end_date(facts)?;
        if end_date < facts.start_date {
            return Err(BillingError::validation(format!(
                "placement ends {} before it starts {}",
                end_date, facts.start_date
            )));
        }

        let mut items = service_fee_items(facts.start_date, end_date, facts.monthly_service_fee);
        items.push(self.arc_fee_item(facts, end_date));
        if let Some(lodging) = &facts.lodging {
            items.extend(dormitory_items(facts.start_date, end_date, lodging));
        }
        items.extend(self.health_check_items(facts.start_date, end_date));

        items.sort_by_key(|item| (item.billing_month, item.category));

        Ok(PlanProjection {
            start_date: facts.start_date,
            end_date,
            items,
        })
    }

    fn resolve_end_date(&self, facts: &PlacementFacts) -> Result<NaiveDate, BillingError> {
        match facts.end_date {
            Some(end) => Ok(end),
            None => facts
                .start_date
                .checked_add_months(Months::new(self.config.default_placement_months))
                .ok_or_else(|| BillingError::validation("placement end date out of range")),
        }
    }

    fn arc_fee_item(&self, facts: &PlacementFacts, end_date: NaiveDate) -> ProjectedItem {
        let coverage_end = facts
            .passport_expiry
            .map_or(end_date, |expiry| expiry.min(end_date));
        let months = months_between(facts.start_date, coverage_end);
        let years = ((months + 11) / 12).max(1);
        let amount = self.config.arc_fee_per_year * Decimal::from(years);

        let mut description = format!(
            "{} for {} year(s) of validity",
            PlanItemCategory::ArcFee.label(),
            years
        );
        if let Some(expiry) = facts.passport_expiry.filter(|expiry| *expiry < end_date) {
            description.push_str(&format!(
                "; passport expires {expiry}, renewal required before placement end {end_date}"
            ));
        }

        ProjectedItem {
            billing_month: BillingMonth::of(facts.start_date),
            category: PlanItemCategory::ArcFee,
            amount,
            is_prorated: false,
            description,
        }
    }

    fn health_check_items(&self, start: NaiveDate, end: NaiveDate) -> Vec<ProjectedItem> {
        HEALTH_CHECK_MILESTONES
            .iter()
            .filter_map(|offset| {
                let due = start.checked_add_months(Months::new(*offset))?;
                (due < end).then(|| ProjectedItem {
                    billing_month: BillingMonth::of(due).prev(),
                    category: PlanItemCategory::HealthCheckFee,
                    amount: self.config.health_check_fee,
                    is_prorated: false,
                    description: format!(
                        "{} (month {offset} milestone due {due})",
                        PlanItemCategory::HealthCheckFee.label()
                    ),
                })
            })
            .collect()
    }
}

fn service_fee_items(start: NaiveDate, end: NaiveDate, monthly_fee: Decimal) -> Vec<ProjectedItem> {
    let first_month = BillingMonth::of(start);
    let last_month = BillingMonth::of(end);

    BillingMonth::range(first_month, last_month)
        .map(|month| {
            let from_day = if month == first_month {
                start.day().min(PRORATION_DAYS)
            } else {
                1
            };
            let to_day = if month == last_month && end != month.last_day() {
                end.day().min(PRORATION_DAYS)
            } else {
                PRORATION_DAYS
            };
            let billable_days = (to_day + 1).saturating_sub(from_day);

            if billable_days >= PRORATION_DAYS {
                ProjectedItem {
                    billing_month: month,
                    category: PlanItemCategory::ServiceFee,
                    amount: monthly_fee,
                    is_prorated: false,
                    description: format!("{} {month}", PlanItemCategory::ServiceFee.label()),
                }
            } else {
                ProjectedItem {
                    billing_month: month,
                    category: PlanItemCategory::ServiceFee,
                    amount: prorate(monthly_fee, billable_days),
                    is_prorated: true,
                    description: format!(
                        "{} {month} (prorated {billable_days}/{PRORATION_DAYS} days)",
                        PlanItemCategory::ServiceFee.label()
                    ),
                }
            }
        })
        .collect()
}

fn dormitory_items(
    start: NaiveDate,
    end: NaiveDate,
    lodging: &LodgingAssignment,
) -> Vec<ProjectedItem> {
    let monthly = lodging.monthly_charge();
    if monthly <= Decimal::ZERO {
        return Vec::new();
    }

    BillingMonth::range(BillingMonth::of(start), BillingMonth::of(end))
        .map(|month| ProjectedItem {
            billing_month: month,
            category: PlanItemCategory::DormitoryFee,
            amount: monthly,
            is_prorated: false,
            description: format!(
                "{} {month} (bed {})",
                PlanItemCategory::DormitoryFee.label(),
                lodging.bed_code
            ),
        })
        .collect()
}

/// `round(monthly_fee / 30 * days)`, multiplied first so whole-unit fees stay exact.
pub fn prorate(monthly_fee: Decimal, billable_days: u32) -> Decimal {
    round_amount(monthly_fee * Decimal::from(billable_days) / Decimal::from(PRORATION_DAYS))
}

/// Whole calendar months from `from` to `to`; zero when `to` is not after `from`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}

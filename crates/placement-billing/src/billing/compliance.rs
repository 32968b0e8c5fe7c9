//! Fee compliance gate for one-off charges.
//!
//! Each [`ComplianceStandard`] variant has its own rule arm, so a new standard
//! has to be handled explicitly instead of inheriting another standard's
//! behavior. The validator is pure: it never touches the store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{ComplianceStandard, FeeCategory, PayerType};

/// Fee as seen by the compliance rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeDefinition {
    pub category: FeeCategory,
    pub name: String,
    pub nationality: Option<String>,
    pub is_zero_fee_subject: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceContext<'a> {
    pub standard: ComplianceStandard,
    pub effective_date: Option<NaiveDate>,
    pub fee: &'a FeeDefinition,
    pub payer: PayerType,
    pub billing_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Allow,
    Warning,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceDecision {
    pub allowed: bool,
    pub severity: Severity,
    pub message: String,
    pub regulation: Option<String>,
}

impl ComplianceDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            severity: Severity::Allow,
            message: "fee permitted".to_string(),
            regulation: None,
        }
    }

    fn warn(message: String, regulation: &str) -> Self {
        Self {
            allowed: true,
            severity: Severity::Warning,
            message,
            regulation: Some(regulation.to_string()),
        }
    }

    fn block(message: String, regulation: &str) -> Self {
        Self {
            allowed: false,
            severity: Severity::Block,
            message,
            regulation: Some(regulation.to_string()),
        }
    }
}

const DEFAULT_BILATERAL_NATIONALITY: &str = "ID";
const DEFAULT_BILATERAL_REGULATION: &str =
    "Taiwan-Indonesia placement agreement (zero placement cost, BP2MI Regulation 9/2020)";

/// Keyword dials backing the rules. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompliancePolicy {
    /// Nationality covered by a bilateral zero-placement-cost agreement.
    pub bilateral_nationality: String,
    pub bilateral_regulation: String,
    pub travel_keywords: Vec<String>,
    pub recruitment_keywords: Vec<String>,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|word| word.to_string()).collect();
        Self {
            bilateral_nationality: DEFAULT_BILATERAL_NATIONALITY.to_string(),
            bilateral_regulation: DEFAULT_BILATERAL_REGULATION.to_string(),
            travel_keywords: words(&["機票", "airfare", "air ticket", "flight", "travel"]),
            recruitment_keywords: words(&[
                "recruitment",
                "agency",
                "service fee",
                "flight",
                "visa",
                "medical check",
                "passport",
                "uniform",
                "badge",
                "招募",
                "仲介",
                "服務費",
                "機票",
                "簽證",
                "體檢",
                "護照",
                "制服",
                "識別證",
            ]),
        }
    }
}

impl CompliancePolicy {
    fn name_matches(name: &str, keywords: &[String]) -> bool {
        let lowered = name.to_lowercase();
        keywords
            .iter()
            .any(|keyword| lowered.contains(&keyword.to_lowercase()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComplianceValidator {
    policy: CompliancePolicy,
}

impl ComplianceValidator {
    pub fn with_policy(policy: CompliancePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CompliancePolicy {
        &self.policy
    }

    pub fn evaluate(&self, context: &ComplianceContext<'_>) -> ComplianceDecision {
        match context.standard {
            ComplianceStandard::None => self.bilateral_rule(context),
            ComplianceStandard::Rba70 | ComplianceStandard::Rba80 => self.rba_rule(context),
            ComplianceStandard::Iway60 => zero_fee_rule(
                context,
                "IWAY 6.0, section 3: no recruitment fees borne by workers",
            ),
            ComplianceStandard::Sa8000 => zero_fee_rule(
                context,
                "SA8000:2014, clause 2.3: workers shall not bear recruitment fees",
            ),
            ComplianceStandard::Unrecognized => ComplianceDecision::allow(),
        }
    }

    fn bilateral_rule(&self, context: &ComplianceContext<'_>) -> ComplianceDecision {
        let fee = context.fee;
        let covered_nationality = fee
            .nationality
            .as_deref()
            .is_some_and(|code| code.eq_ignore_ascii_case(&self.policy.bilateral_nationality));
        let recruitment_like = fee.category == FeeCategory::PlacementFee
            || CompliancePolicy::name_matches(&fee.name, &self.policy.travel_keywords);

        if context.payer == PayerType::Worker && covered_nationality && recruitment_like {
            return ComplianceDecision::warn(
                format!(
                    "'{}' charged to a {} worker may conflict with the bilateral \
                     zero-placement-cost agreement",
                    fee.name, self.policy.bilateral_nationality
                ),
                &self.policy.bilateral_regulation,
            );
        }
        ComplianceDecision::allow()
    }

    fn rba_rule(&self, context: &ComplianceContext<'_>) -> ComplianceDecision {
        if !worker_borne_after_effective_date(context) {
            return ComplianceDecision::allow();
        }

        let fee = context.fee;
        let restricted_category = matches!(
            fee.category,
            FeeCategory::ServiceFee | FeeCategory::PlacementFee | FeeCategory::OfficialFee
        );
        if restricted_category
            || CompliancePolicy::name_matches(&fee.name, &self.policy.recruitment_keywords)
        {
            return ComplianceDecision::block(
                format!(
                    "{} prohibits charging '{}' ({}) to the worker",
                    context.standard.label(),
                    fee.name,
                    fee.category.label()
                ),
                "RBA Code of Conduct, A.1 Freely Chosen Employment",
            );
        }
        ComplianceDecision::allow()
    }
}

fn zero_fee_rule(context: &ComplianceContext<'_>, regulation: &str) -> ComplianceDecision {
    if worker_borne_after_effective_date(context) && context.fee.is_zero_fee_subject {
        return ComplianceDecision::block(
            format!(
                "{} prohibits charging zero-fee item '{}' to the worker",
                context.standard.label(),
                context.fee.name
            ),
            regulation,
        );
    }
    ComplianceDecision::allow()
}

/// Worker pays and the standard is in force on the billing date.
fn worker_borne_after_effective_date(context: &ComplianceContext<'_>) -> bool {
    context.payer == PayerType::Worker
        && context
            .effective_date
            .map_or(true, |effective| context.billing_date >= effective)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn fee(category: FeeCategory, name: &str) -> FeeDefinition {
        FeeDefinition {
            category,
            name: name.to_string(),
            nationality: None,
            is_zero_fee_subject: false,
        }
    }

    fn evaluate(
        standard: ComplianceStandard,
        effective_date: Option<NaiveDate>,
        fee: &FeeDefinition,
        payer: PayerType,
    ) -> ComplianceDecision {
        ComplianceValidator::default().evaluate(&ComplianceContext {
            standard,
            effective_date,
            fee,
            payer,
            billing_date: date(2025, 6, 1),
        })
    }

    #[test]
    fn rba_blocks_worker_recruitment_fee_once_effective() {
        let recruitment = fee(FeeCategory::ServiceFee, "招募服務費");
        let past = Some(date(2024, 1, 1));

        let decision = evaluate(ComplianceStandard::Rba80, past, &recruitment, PayerType::Worker);
        assert!(!decision.allowed);
        assert_eq!(decision.severity, Severity::Block);
        assert!(decision.regulation.is_some());

        let employer_paid =
            evaluate(ComplianceStandard::Rba80, past, &recruitment, PayerType::Employer);
        assert!(employer_paid.allowed);

        let unregulated = evaluate(ComplianceStandard::None, past, &recruitment, PayerType::Worker);
        assert_eq!(unregulated.severity, Severity::Allow);
    }

    #[test]
    fn rba_respects_future_effective_date_and_keywords() {
        let visa = fee(FeeCategory::Other, "Visa processing");
        let future = Some(date(2026, 1, 1));
        assert!(evaluate(ComplianceStandard::Rba70, future, &visa, PayerType::Worker).allowed);
        assert!(!evaluate(ComplianceStandard::Rba70, None, &visa, PayerType::Worker).allowed);

        let dormitory = fee(FeeCategory::DormitoryFee, "Dormitory rent");
        assert!(evaluate(ComplianceStandard::Rba70, None, &dormitory, PayerType::Worker).allowed);
    }

    #[test]
    fn zero_fee_standards_only_block_flagged_fees() {
        let mut item = fee(FeeCategory::Other, "Orientation kit");
        for standard in [ComplianceStandard::Iway60, ComplianceStandard::Sa8000] {
            assert!(evaluate(standard, None, &item, PayerType::Worker).allowed);
        }
        item.is_zero_fee_subject = true;
        for standard in [ComplianceStandard::Iway60, ComplianceStandard::Sa8000] {
            let decision = evaluate(standard, None, &item, PayerType::Worker);
            assert_eq!(decision.severity, Severity::Block, "{standard:?}");
            assert!(evaluate(standard, None, &item, PayerType::Employer).allowed);
        }
    }

    #[test]
    fn unrecognized_standard_fails_open() {
        let mut item = fee(FeeCategory::PlacementFee, "Recruitment fee");
        item.is_zero_fee_subject = true;
        let decision = evaluate(ComplianceStandard::Unrecognized, None, &item, PayerType::Worker);
        assert!(decision.allowed);
        assert_eq!(decision.severity, Severity::Allow);
    }

    #[test]
    fn bilateral_agreement_warns_without_blocking() {
        let mut airfare = fee(FeeCategory::Other, "Return airfare (機票)");
        airfare.nationality = Some("ID".to_string());
        let decision = evaluate(ComplianceStandard::None, None, &airfare, PayerType::Worker);
        assert!(decision.allowed);
        assert_eq!(decision.severity, Severity::Warning);

        airfare.nationality = Some("VN".to_string());
        let decision = evaluate(ComplianceStandard::None, None, &airfare, PayerType::Worker);
        assert_eq!(decision.severity, Severity::Allow);
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::BillingError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a placed worker.
    WorkerId
);
string_id!(EmployerId);
string_id!(
    /// Identifier of one worker's placement with one employer.
    DeploymentId
);
string_id!(PlanId);
string_id!(PlanItemId);
string_id!(
    /// Identifier of a materialized installment.
    ScheduleId
);
string_id!(BillId);
string_id!(BillItemId);
string_id!(PaymentId);
string_id!(FeeItemId);
string_id!(OverrideId);

/// Round a monetary amount to whole currency units, half away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum amounts, or `None` when the total leaves `Decimal`'s range.
pub fn checked_total<I>(amounts: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
}

/// Calendar month used as the billing key. Always anchored on the first day so
/// comparisons never depend on time of day or timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingMonth(NaiveDate);

impl BillingMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn of(date: NaiveDate) -> Self {
        Self(date - Days::new(u64::from(date.day0())))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day() - Days::new(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + Months::new(1))
    }

    pub fn prev(&self) -> Self {
        Self(self.0 - Months::new(1))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    /// Inclusive month range; empty when `to` precedes `from`.
    pub fn range(from: Self, to: Self) -> impl Iterator<Item = BillingMonth> {
        let mut cursor = Some(from);
        std::iter::from_fn(move || {
            let current = cursor.filter(|month| *month <= to)?;
            cursor = Some(current.next());
            Some(current)
        })
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a billing month (expected YYYY-MM)")]
pub struct BillingMonthParseError(String);

impl FromStr for BillingMonth {
    type Err = BillingMonthParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Self::of(date));
        }
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| BillingMonthParseError(raw.to_string()))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| BillingMonthParseError(raw.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| BillingMonthParseError(raw.to_string()))?;
        Self::new(year, month).ok_or_else(|| BillingMonthParseError(raw.to_string()))
    }
}

impl Serialize for BillingMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BillingMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Third-party labor standard an employer has signed up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComplianceStandard {
    #[default]
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "RBA_7_0")]
    Rba70,
    #[serde(rename = "RBA_8_0")]
    Rba80,
    #[serde(rename = "IWAY_6_0")]
    Iway60,
    #[serde(rename = "SA8000")]
    Sa8000,
    #[serde(other, rename = "UNRECOGNIZED")]
    Unrecognized,
}

impl ComplianceStandard {
    pub fn label(&self) -> &'static str {
        match self {
            ComplianceStandard::None => "NONE",
            ComplianceStandard::Rba70 => "RBA 7.0",
            ComplianceStandard::Rba80 => "RBA 8.0",
            ComplianceStandard::Iway60 => "IWAY 6.0",
            ComplianceStandard::Sa8000 => "SA8000",
            ComplianceStandard::Unrecognized => "unrecognized standard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passport {
    pub number: String,
    pub expiry_date: NaiveDate,
}

/// Current bed assignment; the monthly charge is rent plus management fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LodgingAssignment {
    pub bed_code: String,
    pub rent: Decimal,
    pub management_fee: Decimal,
}

impl LodgingAssignment {
    pub fn monthly_charge(&self) -> Decimal {
        self.rent + self.management_fee
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    /// ISO 3166 alpha-2 code, e.g. `ID`, `VN`, `PH`.
    pub nationality: String,
    pub passport: Option<Passport>,
    pub lodging: Option<LodgingAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employer {
    pub id: EmployerId,
    pub name: String,
    pub compliance_standard: ComplianceStandard,
    /// Date from which worker-borne recruitment fees are disallowed. `None`
    /// means the standard applies immediately.
    pub compliance_effective_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: DeploymentId,
    pub worker_id: WorkerId,
    pub employer_id: EmployerId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub monthly_service_fee: Decimal,
}

impl Deployment {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.map_or(true, |end| date <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Normal,
    NeedsReview,
}

/// Projected charge categories. Declaration order is the in-month sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanItemCategory {
    ServiceFee,
    ArcFee,
    DormitoryFee,
    HealthCheckFee,
}

impl PlanItemCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PlanItemCategory::ServiceFee => "Service fee",
            PlanItemCategory::ArcFee => "Residence permit (ARC) fee",
            PlanItemCategory::DormitoryFee => "Dormitory fee",
            PlanItemCategory::HealthCheckFee => "Health check fee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanItemStatus {
    Generated,
    Confirmed,
    Modified,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPlan {
    pub id: PlanId,
    pub deployment_id: DeploymentId,
    pub total_amount: Decimal,
    pub status: PlanStatus,
    pub review_status: ReviewStatus,
    pub review_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPlanItem {
    pub id: PlanItemId,
    pub plan_id: PlanId,
    pub billing_month: BillingMonth,
    pub amount: Decimal,
    pub category: PlanItemCategory,
    pub status: PlanItemStatus,
    pub is_prorated: bool,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

/// Materialized, independently payable installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSchedule {
    pub id: ScheduleId,
    pub deployment_id: DeploymentId,
    pub installment_no: u32,
    pub due_date: NaiveDate,
    pub expected_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: ScheduleStatus,
    pub bill_id: Option<BillId>,
}

impl FeeSchedule {
    pub fn outstanding(&self) -> Decimal {
        self.expected_amount - self.paid_amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Draft,
    Partial,
    Paid,
    Issued,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayerType {
    #[default]
    Worker,
    Employer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: BillId,
    pub worker_id: WorkerId,
    pub deployment_id: Option<DeploymentId>,
    pub year: i32,
    pub month: u32,
    pub bill_date: NaiveDate,
    pub payer_type: PayerType,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance: Decimal,
    pub status: BillStatus,
}

impl Bill {
    /// Record a new cumulative paid amount, keeping `balance == total - paid`
    /// and deriving the status from the result.
    pub fn record_paid(&mut self, paid_amount: Decimal) -> Result<(), BillingError> {
        let balance = self
            .total_amount
            .checked_sub(paid_amount)
            .ok_or_else(|| BillingError::validation("payment amount out of range"))?;
        self.paid_amount = paid_amount;
        self.balance = balance;
        if balance <= Decimal::ZERO {
            self.status = BillStatus::Paid;
        } else if paid_amount > Decimal::ZERO {
            self.status = BillStatus::Partial;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItem {
    pub id: BillItemId,
    pub bill_id: BillId,
    pub description: String,
    pub amount: Decimal,
    /// Set for current-period lines; the aggregated arrears line has none.
    pub schedule_id: Option<ScheduleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub bill_id: BillId,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
}

/// Fee categories used by fee standards and the compliance rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCategory {
    ServiceFee,
    PlacementFee,
    OfficialFee,
    ArcFee,
    DormitoryFee,
    HealthCheckFee,
    TravelFee,
    Other,
}

impl FeeCategory {
    pub fn label(&self) -> &'static str {
        match self {
            FeeCategory::ServiceFee => "service fee",
            FeeCategory::PlacementFee => "placement fee",
            FeeCategory::OfficialFee => "official fee",
            FeeCategory::ArcFee => "ARC fee",
            FeeCategory::DormitoryFee => "dormitory fee",
            FeeCategory::HealthCheckFee => "health check fee",
            FeeCategory::TravelFee => "travel fee",
            FeeCategory::Other => "other fee",
        }
    }
}

/// Named fee standard, optionally specialized by nationality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeItem {
    pub id: FeeItemId,
    pub name: String,
    pub category: FeeCategory,
    pub default_amount: Decimal,
    pub nationality: Option<String>,
    pub is_zero_fee_subject: bool,
}

/// Audit row written when a compliance denial is overridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceOverride {
    pub id: OverrideId,
    pub bill_id: BillId,
    pub reason: String,
    pub message: String,
    pub regulation: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn billing_month_ignores_day_of_month() {
        assert_eq!(BillingMonth::of(date(2025, 3, 31)), BillingMonth::of(date(2025, 3, 1)));
        assert!(BillingMonth::of(date(2025, 3, 15)).contains(date(2025, 3, 31)));
        assert_eq!(
            BillingMonth::of(date(2024, 2, 10)).last_day(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn billing_month_range_crosses_years() {
        let from = BillingMonth::new(2025, 11).expect("month");
        let to = BillingMonth::new(2026, 2).expect("month");
        let labels: Vec<String> = BillingMonth::range(from, to).map(|m| m.to_string()).collect();
        assert_eq!(labels, ["2025-11", "2025-12", "2026-01", "2026-02"]);
        assert_eq!(BillingMonth::range(to, from).count(), 0);
    }

    #[test]
    fn billing_month_parses_month_and_date_forms() {
        let month: BillingMonth = "2025-07".parse().expect("parses");
        assert_eq!((month.year(), month.month()), (2025, 7));
        let from_date: BillingMonth = "2025-07-19".parse().expect("parses");
        assert_eq!(month, from_date);
        assert!("2025-13".parse::<BillingMonth>().is_err());
        assert!("July".parse::<BillingMonth>().is_err());
    }

    #[test]
    fn round_amount_rounds_half_away_from_zero() {
        assert_eq!(round_amount(dec!(10.5)), dec!(11));
        assert_eq!(round_amount(dec!(10.49)), dec!(10));
        assert_eq!(round_amount(dec!(11.5)), dec!(12));
    }

    #[test]
    fn unknown_standard_deserializes_as_unrecognized() {
        let standard: ComplianceStandard =
            serde_json::from_str("\"ISO_45001\"").expect("falls back");
        assert_eq!(standard, ComplianceStandard::Unrecognized);
        let standard: ComplianceStandard = serde_json::from_str("\"RBA_8_0\"").expect("parses");
        assert_eq!(standard, ComplianceStandard::Rba80);
    }

    #[test]
    fn bill_status_follows_balance() {
        let mut bill = Bill {
            id: BillId::from("bill-1"),
            worker_id: WorkerId::from("w-1"),
            deployment_id: None,
            year: 2025,
            month: 1,
            bill_date: date(2025, 1, 1),
            payer_type: PayerType::Worker,
            total_amount: dec!(1500),
            paid_amount: Decimal::ZERO,
            balance: dec!(1500),
            status: BillStatus::Draft,
        };
        bill.record_paid(Decimal::ZERO).expect("in range");
        assert_eq!(bill.status, BillStatus::Draft);
        bill.record_paid(dec!(200)).expect("in range");
        assert_eq!((bill.status, bill.balance), (BillStatus::Partial, dec!(1300)));
        bill.record_paid(dec!(1600)).expect("in range");
        assert_eq!((bill.status, bill.balance), (BillStatus::Paid, dec!(-100)));

        bill.total_amount = Decimal::MIN;
        let error = bill.record_paid(dec!(1)).expect_err("balance overflows");
        assert!(matches!(error, BillingError::Validation(_)));
        assert_eq!(bill.paid_amount, dec!(1600));
    }

    #[test]
    fn checked_total_reports_overflow() {
        assert_eq!(checked_total([dec!(1000), dec!(300)]), Some(dec!(1300)));
        assert_eq!(checked_total(Vec::new()), Some(Decimal::ZERO));
        assert_eq!(checked_total([Decimal::MAX, dec!(1)]), None);
    }
}

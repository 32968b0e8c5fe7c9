use crate::infra::{
    parse_amount, parse_date, seed_ledger, SEED_ID_WORKER, SEED_VN_DEPLOYMENT, SEED_VN_WORKER,
};
use chrono::NaiveDate;
use clap::Args;
use placement_billing::billing::{
    write_plan_csv, BillingService, BillingStore, DeploymentId, FeeCategory, FixedFeeOutcome,
    FixedFeeRequest, InMemoryBillingStore, LodgingAssignment, PlacementFacts, PlanGenerator,
    PlanProjection, WorkerId,
};
use placement_billing::config::BillingConfig;
use placement_billing::error::AppError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct PlanArgs {
    /// Placement start date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: NaiveDate,
    /// Placement end date (YYYY-MM-DD). Defaults to the configured placement length.
    #[arg(long, value_parser = parse_date)]
    pub(crate) end: Option<NaiveDate>,
    /// Monthly service fee charged to the worker
    #[arg(long, value_parser = parse_amount)]
    pub(crate) monthly_fee: Decimal,
    /// Passport expiry date (YYYY-MM-DD) limiting ARC coverage
    #[arg(long, value_parser = parse_date)]
    pub(crate) passport_expiry: Option<NaiveDate>,
    /// Monthly dormitory rent
    #[arg(long, value_parser = parse_amount)]
    pub(crate) rent: Option<Decimal>,
    /// Monthly dormitory management fee
    #[arg(long, value_parser = parse_amount)]
    pub(crate) management_fee: Option<Decimal>,
    /// Bed code printed on dormitory lines
    #[arg(long, default_value = "unassigned")]
    pub(crate) bed: String,
    /// Write the projected items to this CSV file
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Payment applied to the February bill
    #[arg(long, value_parser = parse_amount, default_value = "6000")]
    pub(crate) payment: Decimal,
    /// Skip the fixed-fee compliance portion of the demo
    #[arg(long)]
    pub(crate) skip_compliance: bool,
}

pub(crate) fn run_plan_preview(args: PlanArgs) -> Result<(), AppError> {
    let generator = PlanGenerator::new(BillingConfig::from_env()?);
    let facts = plan_facts(&args);
    let projection = generator.project(&facts)?;

    render_projection(&projection);

    if let Some(path) = args.csv {
        let file = File::create(&path)?;
        write_plan_csv(&projection.items, file)?;
        println!("\nWrote {} line(s) to {}", projection.items.len(), path.display());
    }

    Ok(())
}

fn plan_facts(args: &PlanArgs) -> PlacementFacts {
    let lodging = match (args.rent, args.management_fee) {
        (None, None) => None,
        (rent, management_fee) => Some(LodgingAssignment {
            bed_code: args.bed.clone(),
            rent: rent.unwrap_or_default(),
            management_fee: management_fee.unwrap_or_default(),
        }),
    };

    PlacementFacts {
        start_date: args.start,
        end_date: args.end,
        monthly_service_fee: args.monthly_fee,
        passport_expiry: args.passport_expiry,
        lodging,
    }
}

fn render_projection(projection: &PlanProjection) {
    println!(
        "Billing plan {} -> {} ({} line(s))",
        projection.start_date,
        projection.end_date,
        projection.items.len()
    );
    for item in &projection.items {
        let marker = if item.is_prorated { " *" } else { "" };
        println!(
            "  {} | {:<28} | {:>10}{} | {}",
            item.billing_month,
            item.category.label(),
            item.amount,
            marker,
            item.description
        );
    }
    println!("  Total: {}", projection.total());
    if projection.items.iter().any(|item| item.is_prorated) {
        println!("  (* prorated on a 30-day month)");
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        payment,
        skip_compliance,
    } = args;

    let store = Arc::new(InMemoryBillingStore::with_ledger(seed_ledger()?));
    let service = BillingService::new(store, BillingConfig::from_env()?);
    let deployment_id = DeploymentId::from(SEED_VN_DEPLOYMENT);

    println!("Placement billing demo");
    let plan = service.generate_plan(&deployment_id)?;
    println!(
        "- Generated plan {} for {} with {}: {} line(s), total {}",
        plan.plan.id,
        plan.worker.name,
        plan.employer.name,
        plan.items.len(),
        plan.plan.total_amount
    );
    for item in plan.items.iter().take(4) {
        println!("    {} {} {}", item.billing_month, item.amount, item.description);
    }

    let flagged = service.flag_for_review(&deployment_id, "dormitory bed reassigned")?;
    let report = service.simulate(&plan.plan.id)?;
    println!(
        "- Flagged {flagged} plan(s) for review; re-simulation shows {} change(s) ({} -> {})",
        report
            .diff
            .items
            .iter()
            .filter(|item| item.is_different)
            .count()
            + report.diff.removed_items.len(),
        report.diff.current_total,
        report.diff.suggested_total
    );

    let confirmed = service.confirm_plan(&plan.plan.id, &[])?;
    let schedules = service.materialize_schedules(&plan.plan.id)?;
    println!(
        "- Confirmed plan ({:?}), materialized {} installment(s)",
        confirmed.plan.status,
        schedules.len()
    );

    let january = service.generate_monthly_bills(Some(2025), Some(1))?;
    println!("- {}", january.message());
    let february = service.generate_monthly_bills(Some(2025), Some(2))?;
    println!("- {} (January left unpaid)", february.message());

    let Some(bill_id) = february.bill_ids.first().cloned() else {
        println!("  No February bill produced; nothing to pay");
        return Ok(());
    };
    let bill = service.bill(&bill_id)?;
    println!(
        "  Bill {} total {} across {} line(s)",
        bill.bill.id,
        bill.bill.total_amount,
        bill.items.len()
    );

    let outcome = service.pay_bill(&bill_id, payment, bill.bill.bill_date)?;
    println!("- Paid {payment}: {} ({:?})", outcome.message, outcome.status);
    for schedule in service.bill(&bill_id)?.schedules {
        println!(
            "    installment {} due {}: {} of {} ({:?})",
            schedule.installment_no,
            schedule.due_date,
            schedule.paid_amount,
            schedule.expected_amount,
            schedule.status
        );
    }

    if skip_compliance {
        return Ok(());
    }

    println!("\nFixed-fee compliance checks");
    let recruitment = FixedFeeRequest {
        worker_id: WorkerId::from(SEED_VN_WORKER),
        fee_type: Some(FeeCategory::ServiceFee),
        name: Some("Recruitment service fee".to_string()),
        amount: None,
        description: None,
        bill_date: Some(bill.bill.bill_date),
        override_reason: None,
        payer_type: None,
    };
    describe_fixed_fee(
        "RBA employer, worker-paid recruitment fee",
        service.create_fixed_fee(&recruitment)?,
    );

    let overridden = FixedFeeRequest {
        override_reason: Some("refund to worker agreed in writing".to_string()),
        ..recruitment
    };
    describe_fixed_fee("same fee with an override", service.create_fixed_fee(&overridden)?);

    let airfare = FixedFeeRequest {
        worker_id: WorkerId::from(SEED_ID_WORKER),
        fee_type: Some(FeeCategory::TravelFee),
        name: Some("Return airfare".to_string()),
        amount: Some(dec!(12000)),
        description: None,
        bill_date: Some(bill.bill.bill_date),
        override_reason: None,
        payer_type: None,
    };
    describe_fixed_fee("Indonesian worker airfare", service.create_fixed_fee(&airfare)?);

    let overrides = service
        .store()
        .read(|ledger| ledger.overrides.live_count())
        .map_err(placement_billing::billing::BillingError::from)?;
    println!("- Compliance overrides on record: {overrides}");

    Ok(())
}

fn describe_fixed_fee(label: &str, outcome: FixedFeeOutcome) {
    match outcome {
        FixedFeeOutcome::RequiresConfirmation {
            warning_message,
            block_level,
            ..
        } => println!("- {label}: needs confirmation ({block_level:?}) - {warning_message}"),
        FixedFeeOutcome::Created {
            bill,
            compliance_warning,
            override_recorded,
        } => {
            println!(
                "- {label}: bill {} for {} created (override recorded: {override_recorded})",
                bill.id, bill.total_amount
            );
            if let Some(warning) = compliance_warning {
                println!("    warning: {warning}");
            }
        }
    }
}

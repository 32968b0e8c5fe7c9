use std::io::Write;

use serde::Serialize;

use super::generator::ProjectedItem;

#[derive(Serialize)]
struct PlanCsvRow<'a> {
    billing_month: String,
    category: &'a str,
    amount: String,
    prorated: bool,
    description: &'a str,
}

/// Write projected items as CSV, one row per line item.
pub fn write_plan_csv<W: Write>(items: &[ProjectedItem], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for item in items {
        csv_writer.serialize(PlanCsvRow {
            billing_month: item.billing_month.to_string(),
            category: item.category.label(),
            amount: item.amount.to_string(),
            prorated: item.is_prorated,
            description: &item.description,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::domain::{BillingMonth, PlanItemCategory};
    use rust_decimal_macros::dec;

    #[test]
    fn writes_header_and_rows() {
        let items = vec![ProjectedItem {
            billing_month: BillingMonth::new(2025, 3).expect("month"),
            category: PlanItemCategory::ServiceFee,
            amount: dec!(900),
            is_prorated: true,
            description: "Service fee 2025-03 (prorated 15/30 days)".to_string(),
        }];
        let mut buffer = Vec::new();
        write_plan_csv(&items, &mut buffer).expect("csv written");
        let text = String::from_utf8(buffer).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("billing_month,category,amount,prorated,description")
        );
        assert_eq!(
            lines.next(),
            Some("2025-03,Service fee,900,true,Service fee 2025-03 (prorated 15/30 days)")
        );
    }
}

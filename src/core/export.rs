use std::io::Write;

use super::types::YearSnapshot;

pub const CSV_HEADER: [&str; 8] = [
    "Year",
    "HomeLoanA",
    "NetWealthA",
    "HomeLoanB",
    "InvestLoanB",
    "PortfolioB",
    "NetWealthB",
    "DebtFreePosition",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write CSV row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV output: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes one row per snapshot with unformatted numbers. `DebtFreePosition` is the
/// surplus if the portfolio were liquidated to clear all debt.
pub fn write_csv<W: Write>(years: &[YearSnapshot], writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;

    for snapshot in years {
        wtr.write_record([
            snapshot.year.to_string(),
            snapshot.home_loan_a.to_string(),
            snapshot.net_wealth_a.to_string(),
            snapshot.home_loan_b.to_string(),
            snapshot.invest_loan_b.to_string(),
            snapshot.portfolio_b.to_string(),
            snapshot.net_wealth_b.to_string(),
            snapshot.surplus_if_liquidated.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

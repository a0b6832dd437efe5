//! Report generation port.

use std::path::Path;

use crate::domain::comparator::Comparison;
use crate::domain::error::GatetraderError;
use crate::domain::pipeline::BacktestResult;

pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), GatetraderError>;

    /// Default: one report per successful row, named after the symbol.
    fn write_comparison(&self, comparison: &Comparison, output_path: &Path) -> Result<(), GatetraderError> {
        for row in &comparison.rows {
            if let Ok(result) = &row.result {
                let file = format!("{}.csv", row.symbol.replace('/', "_"));
                self.write(result, &output_path.join(file))?;
            }
        }
        Ok(())
    }
}

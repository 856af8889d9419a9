use crate::domain::transaction::Transaction;
use crate::error::Result;
use std::io::Write;

/// Writes ledger entries as CSV to any `Write` sink.
///
/// This is the admin-facing export: one row per transaction, stable column
/// order, amounts as recorded (net for payouts).
pub struct LedgerWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_transactions(&mut self, transactions: &[Transaction]) -> Result<()> {
        self.writer
            .write_record(["id", "assignment", "kind", "amount", "status", "timestamp"])?;
        for tx in transactions {
            self.writer.write_record([
                tx.id.to_string(),
                tx.assignment_id.to_string(),
                tx.kind.to_string(),
                // Trailing zeros vary with the arithmetic that produced the
                // amount; normalize so exports are stable.
                tx.amount.value().normalize().to_string(),
                tx.status.to_string(),
                tx.timestamp.to_rfc3339(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

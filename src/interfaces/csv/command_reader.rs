use crate::domain::command::Command;
use crate::error::{LedgerError, Result};
use std::io::Read;

/// Reads replayable commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so trailing optional columns may be left off.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one command per row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::Operation;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, member, target, detail, amount\n\
                    credit, 1, self, , 1000\n\
                    request_payout, 1, , bank, 300\n\
                    resolve, 2, 1, accept";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<Command>> = reader.commands().collect();

        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.op, Operation::Credit);
        assert_eq!(first.amount, Some(dec!(1000)));
        let last = results[2].as_ref().unwrap();
        assert_eq!(last.op, Operation::Resolve);
        assert_eq!(last.amount, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op, member, target, detail, amount\nrefund, 1, , , 1.0\ndebit, x, , , 1";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<Command>> = reader.commands().collect();

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(LedgerError::CsvError(_))));
        assert!(results[1].is_err());
    }
}

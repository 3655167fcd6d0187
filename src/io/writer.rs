use std::io::Write;

use tracing::info;

use crate::core::error::Result;

/// Fixed tail appended to the original columns of every output row.
const OUTPUT_TAIL: [&str; 13] = [
    "matchedType",
    "matchSize",
    "inputName",
    "matchedName",
    "inputCanonicalForm",
    "matchedCanonicalForm",
    "matchedEditDistance",
    "inputRank",
    "matchedRank",
    "synonymStatus",
    "acceptedName",
    "matchedScore",
    "matchedTaxonID",
];

const CLASSIFICATION_FIELD: &str = "classification";

/// Sink for enriched output rows. `None` cells serialize as empty values.
pub trait RowWriter: Send {
    fn write(&mut self, row: &[Option<String>]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// CSV writer that emits the header on construction and flushes exactly
/// once on close.
pub struct CsvWriter {
    output: csv::Writer<Box<dyn Write + Send>>,
    name: String,
    closed: bool,
}

impl CsvWriter {
    pub fn new<W: Write + Send + 'static>(
        sink: W,
        original_fields: &[String],
        with_classification: bool,
        name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        info!("Open output to {}", name);
        let mut output = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Box::new(sink) as Box<dyn Write + Send>);
        output.write_record(output_fields(original_fields, with_classification))?;
        Ok(Self {
            output,
            name,
            closed: false,
        })
    }
}

impl RowWriter for CsvWriter {
    fn write(&mut self, row: &[Option<String>]) -> Result<()> {
        self.output
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("Close {}", self.name);
        self.output.flush()?;
        Ok(())
    }
}

fn output_fields(original_fields: &[String], with_classification: bool) -> Vec<String> {
    let mut fields: Vec<String> = original_fields.to_vec();
    fields.extend(OUTPUT_TAIL.iter().map(|f| f.to_string()));
    if with_classification {
        fields.push(CLASSIFICATION_FIELD.to_string());
    }
    fields
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::RowWriter;
    use crate::core::error::Result;

    pub type Rows = Arc<Mutex<Vec<Vec<Option<String>>>>>;

    /// Captures rows in memory for assertions.
    pub struct MemoryWriter {
        rows: Rows,
        closes: Arc<Mutex<usize>>,
    }

    impl MemoryWriter {
        pub fn new() -> (Self, Rows, Arc<Mutex<usize>>) {
            let rows: Rows = Arc::new(Mutex::new(Vec::new()));
            let closes = Arc::new(Mutex::new(0));
            (
                Self {
                    rows: rows.clone(),
                    closes: closes.clone(),
                },
                rows,
                closes,
            )
        }
    }

    impl RowWriter for MemoryWriter {
        fn write(&mut self, row: &[Option<String>]) -> Result<()> {
            self.rows.lock().unwrap().push(row.to_vec());
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }
    }
}

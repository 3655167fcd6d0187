pub mod reader;
pub mod writer;

pub use reader::NameReader;
pub use writer::{CsvWriter, RowWriter};

mod reader;
mod types;
mod writer;

pub use reader::ReportReader;
pub use types::*;
pub use writer::ReportWriter;

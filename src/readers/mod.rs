mod batch;
mod builders;
mod header;
mod stream;
mod xml_parser;
mod xml_reader;

pub use batch::Batch;
pub use header::Header;
pub use xml_parser::ParseOptions;
pub use xml_reader::{IterableReader, XmlReader};

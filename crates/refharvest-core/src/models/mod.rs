pub mod record;
pub mod source_format;

pub use record::{ReferenceRecord, UNKNOWN_AUTHOR};
pub use source_format::{FieldMapping, SourceFormat};

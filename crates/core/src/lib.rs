pub mod a1;
pub mod clock;
pub mod error;
pub mod field_value;
pub mod header;
pub mod ids;
pub mod locator;
pub mod write;

pub use error::CoreError;
pub use field_value::{FieldMap, FieldValue};
pub use header::HeaderMap;
pub use ids::RecordId;
pub use locator::RowLocator;
pub use write::CompiledWrite;

//! Data model - field descriptions, records and query descriptors
//!
//! A model is an ordered list of field descriptors plus the name of the
//! identity field. Records are loosely typed (JSON values keyed by field
//! name) so one proxy can serve any model shape.

pub mod descriptor;
pub mod field;
pub mod record;

pub use descriptor::{FilterDescriptor, GrouperDescriptor, SortDirection, SorterDescriptor};
pub use field::{FieldDescriptor, LogicalType, Model};
pub use record::Record;

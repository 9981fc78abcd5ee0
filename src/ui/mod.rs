pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{header, operation_outcome, reconcile_report, status, success};
pub use table::{records_table, schema_table};
pub use theme::{theme, Theme};

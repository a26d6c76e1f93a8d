//! Per-table CRUD operations and the schema-driven payload validator they share.

mod crud;
mod validation;
pub use crud::{TableEndpoints, MAX_LIST_LIMIT};
pub use validation::{escape_html, is_blank, is_numeric, parse_datetime, FieldError, FieldValidator};

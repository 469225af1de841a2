pub mod timezone;

pub use timezone::{warehouse_now, warehouse_now_rfc3339};

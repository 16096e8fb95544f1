//! Instruction Compilers (C5) — one module per clause of a query's
//! instruction bag.

pub mod cursor;
pub mod including;
pub mod limited_to;
pub mod ordered_by;
pub mod selecting;
pub mod to;
pub mod using;

pub use cursor::Cursor;
pub use including::{IncludingPlan, Mount};

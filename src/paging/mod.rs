//! Cursor paging
//!
//! Fetch size + 1, detect the next page, encode the boundary key tuple.
//! Cursor problems are never fatal: they restart paging at the first page.

mod cursor;
mod pager;

pub use cursor::{CursorError, CursorPayload};
pub use pager::{PagedRecords, Pager};

//! Read path: page selection, cross-page interval reads and current values

pub mod cur_values;
pub mod reader;
pub mod selection;

pub use cur_values::CurrentValueIndex;
pub use reader::StorageReader;
pub use selection::{select_pages, PageSelection};

//! Page files, their skip indexes and the page lifecycle

pub mod checksum;
pub mod index;
pub mod page;
pub mod page_constants;
pub mod page_header;
pub mod page_io;
pub mod page_manager;
pub mod page_reader;

pub use index::{Index, IndexRecord};
pub use page::{Page, WriteWindow};
pub use page_header::PageHeader;
pub use page_manager::{PageInfo, PageManager};
pub use page_reader::PageReader;

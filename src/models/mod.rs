pub mod media_item;
pub mod page;

pub use media_item::*;
pub use page::*;

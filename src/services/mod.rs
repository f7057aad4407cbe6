pub mod feed;
pub mod loose;
pub mod pagination;
pub mod thread;
pub mod visibility;

pub use loose::LooseService;

pub mod droid;
pub mod page;
pub mod pipeline;
pub mod scheme_scraper;
pub mod scheme_searcher;
pub mod timing;

#[cfg(test)]
pub(crate) mod testing;

pub use droid::*;
pub use page::*;
pub use pipeline::*;
pub use scheme_scraper::*;
pub use scheme_searcher::*;
pub use timing::*;

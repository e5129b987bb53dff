pub mod criteria;
pub mod region;
pub mod scheme;

pub use criteria::*;
pub use region::*;
pub use scheme::*;

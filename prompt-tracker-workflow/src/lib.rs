pub mod report;
pub mod runner;
pub mod store;

pub use report::*;
pub use runner::*;
pub use store::*;

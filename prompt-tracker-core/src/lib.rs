pub mod capabilities;
pub mod config;
pub mod domain;
pub mod error;
pub mod judge;
pub mod params;
pub mod traits;

pub use capabilities::*;
pub use config::*;
pub use domain::*;
pub use error::*;
pub use judge::*;
pub use params::*;
pub use traits::*;

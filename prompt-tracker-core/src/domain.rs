pub mod api;
pub mod conversation;
pub mod evaluation;
pub mod normalized;

pub use api::*;
pub use conversation::*;
pub use evaluation::*;
pub use normalized::*;

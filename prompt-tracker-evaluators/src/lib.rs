//! Scoring for normalized LLM responses and conversations.
//!
//! Every evaluator implements [`Evaluator`] and is described by an
//! [`EvaluatorDescriptor`] in the [`EvaluatorRegistry`], which also decides
//! which provider APIs an evaluator may run against.

pub mod base;
pub mod evaluators;
pub mod judging;
pub mod registry;

pub use base::*;
pub use evaluators::*;
pub use judging::*;
pub use registry::*;

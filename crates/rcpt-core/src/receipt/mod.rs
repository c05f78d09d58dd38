//! Receipt text classification and extraction.
//!
//! Raw recognized text flows through three stages:
//! - [`ErrorScreenDetector`] rejects captured error/debug screens early
//! - [`LineClassifier`] splits text into lines and assigns each a role
//! - [`ReceiptAssembler`] turns the roles into a [`ParseResult`](crate::ParseResult)

mod assembler;
mod classifier;
mod detector;
pub mod rules;

pub use assembler::ReceiptAssembler;
pub use classifier::{split_lines, Classification, ClassifiedLine, Line, LineClassifier, LineRole};
pub use detector::{ErrorScreenDetector, ErrorScreenVerdict};

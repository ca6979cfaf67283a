//! Domain models for studies, cohorts, visits and procedures.

mod animal;
mod procedure;
mod study;
mod visit;

pub use animal::*;
pub use procedure::*;
pub use study::*;
pub use visit::*;

use thiserror::Error;

/// A string that does not name any variant of a domain enum.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

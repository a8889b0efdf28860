//! Human and machine readable renderings of estimates and probe runs.

pub mod json;
pub mod text;

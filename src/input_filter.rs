//! Validation-rule export for an external input-filter subsystem.

use serde::Serialize;
use std::collections::BTreeMap;

/// Rule overrides for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputSpec {
    pub required: bool,
}

/// Input name to rule overrides. Inputs not listed keep the consumer's defaults.
pub type InputFilterSpec = BTreeMap<String, InputSpec>;

/// Implemented by structures that contribute validation rules.
pub trait InputFilterProvider {
    fn input_filter_specification(&self) -> InputFilterSpec;
}

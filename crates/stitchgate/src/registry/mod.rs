// Per-source registration caches sitting between the pollers and their
// dependents

mod descriptor;
mod rules;

pub use descriptor::DescriptorRegistry;
pub use rules::{RuleRegistry, RulesChanged};

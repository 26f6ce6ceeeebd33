//! Detection of code-quality issues on the finished graph.

mod complexity;
mod cycles;
mod envy;
mod god_objects;
mod runner;
mod types;
mod unused;

pub use complexity::{detect_deep_nesting, detect_high_complexity};
pub use cycles::{detect_circular_dependencies, find_cycles};
pub use envy::detect_feature_envy;
pub use god_objects::{detect_god_classes, detect_long_methods};
pub use runner::Runner;
pub use types::{CodeIssue, IssueType, Severity, Thresholds};
pub use unused::{
    detect_dead_code, detect_unused_functions, detect_unused_imports, detect_unused_variables,
};

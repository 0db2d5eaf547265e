pub mod aggregate;
pub mod types;

pub use aggregate::{
    build_report, classify_fixes, collect_issues, compute_overall_status, diff_issues,
    now_rfc3339, IssueDiff,
};
pub use types::*;

//! CLI command implementations.

pub mod init_db;
pub mod train;

/// Width of the banner rules printed around command reports.
const RULE_WIDTH: usize = 70;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

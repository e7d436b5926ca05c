//! Process exit codes for `reviewbench`.

pub const SUCCESS: i32 = 0;
pub const NO_RESULTS: i32 = 1; // Run finished but no test case could be scored
pub const CONFIG_ERROR: i32 = 2; // Bad config, credentials, provider or unreadable corpus

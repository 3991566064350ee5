//! JSON output formatting for CLI commands
//!
//! Reports pass through `serde_json::Value` before printing: the default
//! map implementation keeps object keys sorted, which is what keeps
//! snapshot-based consumers stable.

use serde::Serialize;

pub fn print_json<T: Serialize>(data: &T) {
    if let Ok(value) = serde_json::to_value(data)
        && let Ok(json) = serde_json::to_string_pretty(&value)
    {
        println!("{json}");
    }
}

//! Message for a run whose filters selected nothing

use std::io::Write;

use super::Filter;

const NONE: &str = "<none>";

/// Line naming both filters; an absent filter reads `<none>`
pub fn no_tests_message(keyword: Option<&str>, marks: Option<&str>) -> String {
    format!(
        "no tests ran matching keyword expression '{}' and mark expression '{}'",
        keyword.unwrap_or(NONE),
        marks.unwrap_or(NONE)
    )
}

/// Write the message to the run output
pub fn report(out: &mut dyn Write, filter: &Filter) -> std::io::Result<()> {
    writeln!(out, "{}", no_tests_message(filter.keyword(), filter.marks()))
}

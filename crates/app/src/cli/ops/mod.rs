pub mod cat;
pub mod cp;
pub mod export;
pub mod init;
pub mod ls;
pub mod put;
pub mod rm;
pub mod search;
pub mod version;
pub mod whoami;

pub use cat::Cat;
pub use cp::Cp;
pub use export::Export;
pub use init::Init;
pub use ls::Ls;
pub use put::Put;
pub use rm::Rm;
pub use search::Search;
pub use version::Version;
pub use whoami::Whoami;

use common::bulk::BulkReport;
use common::store::Entry;

/// One listing line: size, modification time, name.
pub(crate) fn entry_line(entry: &Entry) -> String {
    let size = match (entry.is_file, entry.size) {
        (false, _) => "-".to_string(),
        (true, Some(size)) => size.to_string(),
        (true, None) => "?".to_string(),
    };
    let modified = entry
        .last_modified
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{:>12}  {:<16}  {}", size, modified, entry.name)
}

pub(crate) fn report_line(verb: &str, report: &BulkReport) -> String {
    if report.skipped == 0 {
        format!("{} {} item(s)", verb, report.completed)
    } else {
        format!(
            "{} {} item(s), skipped {} not permitted",
            verb, report.completed, report.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_line_for_directory() {
        let line = entry_line(&Entry::directory("sub/", "docs/sub/"));
        assert!(line.trim_start().starts_with('-'));
        assert!(line.ends_with("sub/"));
    }

    #[test]
    fn test_report_line() {
        let report = BulkReport {
            completed: 3,
            skipped: 0,
        };
        assert_eq!(report_line("deleted", &report), "deleted 3 item(s)");

        let report = BulkReport {
            completed: 3,
            skipped: 2,
        };
        assert!(report_line("copied", &report).contains("skipped 2"));
    }
}

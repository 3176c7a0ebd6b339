// LinkedIn "Connections.csv" parser (CandidateSource)

use async_trait::async_trait;
use chrono::NaiveDate;
use contactsync_core::domain::{CandidateRecord, ContactFields};
use contactsync_core::port::{CandidateSource, SourceError};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// Export column headers
const FIRST_NAME: &str = "First Name";
const LAST_NAME: &str = "Last Name";
const URL: &str = "URL";
const EMAIL: &str = "Email Address";
const PHONE_NUMBERS: &str = "Phone Numbers";
const COMPANY: &str = "Company";
const POSITION: &str = "Position";
const CONNECTED_ON: &str = "Connected On";

/// Column positions resolved from the header row
struct Columns {
    first_name: usize,
    last_name: usize,
    url: Option<usize>,
    email: Option<usize>,
    phone: Option<usize>,
    company: Option<usize>,
    position: Option<usize>,
    connected_on: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, SourceError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let required =
            |name: &str| find(name).ok_or_else(|| SourceError::MissingColumn(name.to_string()));

        Ok(Self {
            first_name: required(FIRST_NAME)?,
            last_name: required(LAST_NAME)?,
            url: find(URL),
            email: find(EMAIL),
            phone: find(PHONE_NUMBERS),
            company: find(COMPANY),
            position: find(POSITION),
            connected_on: find(CONNECTED_ON),
        })
    }
}

fn cell(record: &StringRecord, column: Option<usize>) -> String {
    column
        .and_then(|i| record.get(i))
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// `15 Mar 2023` as exported, or ISO `2023-03-15`
pub fn parse_connected_on(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d %b %Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Byte offset and 1-based line of the header row.
///
/// LinkedIn prefixes the export with a few "Notes:" lines.
fn find_header(content: &str) -> Option<(usize, u64)> {
    let mut offset = 0;
    for (index, line) in content.split_inclusive('\n').enumerate() {
        if line.trim_start_matches('"').starts_with(FIRST_NAME) {
            return Some((offset, index as u64 + 1));
        }
        offset += line.len();
    }
    None
}

/// Parse export text into candidates, in file order
pub fn parse_export(content: &str) -> Result<Vec<CandidateRecord>, SourceError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let (offset, header_line) =
        find_header(content).ok_or_else(|| SourceError::MissingColumn(FIRST_NAME.to_string()))?;

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content[offset..].as_bytes());

    // Reader positions are relative to the header row
    let absolute = |line: u64| header_line + line.saturating_sub(1);
    let malformed = |err: csv::Error| SourceError::Malformed {
        line: absolute(err.position().map(|p| p.line()).unwrap_or(1)),
        message: err.to_string(),
    };

    let columns = Columns::resolve(reader.headers().map_err(malformed)?)?;
    let mut candidates = Vec::new();

    for row in reader.records() {
        let row = row.map_err(malformed)?;
        let line = absolute(row.position().map(|p| p.line()).unwrap_or(1));

        let name = format!(
            "{} {}",
            cell(&row, Some(columns.first_name)),
            cell(&row, Some(columns.last_name))
        )
        .trim()
        .to_string();

        let connected_raw = cell(&row, columns.connected_on);
        let connected_on = if connected_raw.is_empty() {
            None
        } else {
            let parsed = parse_connected_on(&connected_raw);
            if parsed.is_none() {
                warn!(line = line, value = %connected_raw, "Unrecognized connection date, leaving it empty");
            }
            parsed
        };

        let fields = ContactFields {
            name,
            email: cell(&row, columns.email),
            phone: cell(&row, columns.phone),
            company: cell(&row, columns.company),
            position: cell(&row, columns.position),
            connected_on,
            ..Default::default()
        };
        candidates.push(CandidateRecord::new(cell(&row, columns.url), fields));
    }

    Ok(candidates)
}

/// Reads exports from disk on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkedInCsvSource;

impl LinkedInCsvSource {
    pub fn new() -> Self {
        Self
    }
}

fn parse_file(path: &Path) -> Result<Vec<CandidateRecord>, SourceError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SourceError::Io(format!("{}: {}", path.display(), e)))?;
    let candidates = parse_export(&content)?;
    debug!(path = %path.display(), candidates = candidates.len(), "Parsed LinkedIn export");
    Ok(candidates)
}

#[async_trait]
impl CandidateSource for LinkedInCsvSource {
    async fn parse(&self, path: &Path) -> Result<Vec<CandidateRecord>, SourceError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || parse_file(&path))
            .await
            .map_err(|e| SourceError::Io(format!("parser task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPORT: &str = "\
Notes:
\"When exporting your connection data, you may notice that some of the email addresses are missing.\"

First Name,Last Name,URL,Email Address,Company,Position,Connected On
Ada,Lovelace,https://www.linkedin.com/in/ada,ada@example.com,Analytical Engines,Mathematician,15 Mar 2023
Grace,Hopper,https://www.linkedin.com/in/grace,,\"Navy, US\",Rear Admiral,2023-04-01
Alan,,https://www.linkedin.com/in/alan,,,,sometime
";

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_skips_preamble() {
        let candidates = parse_export(EXPORT).unwrap();
        assert_eq!(candidates.len(), 3);

        let ada = &candidates[0];
        assert_eq!(ada.match_key, "https://www.linkedin.com/in/ada");
        assert_eq!(ada.fields.name, "Ada Lovelace");
        assert_eq!(ada.fields.email, "ada@example.com");
        assert_eq!(ada.fields.company, "Analytical Engines");
        assert_eq!(ada.fields.position, "Mathematician");
        assert_eq!(ada.fields.connected_on, Some(day(2023, 3, 15)));
        assert_eq!(ada.fields.cadence, None);
        assert_eq!(ada.fields.last_contacted, None);

        assert_eq!(candidates[1].fields.company, "Navy, US");
        assert_eq!(candidates[1].fields.connected_on, Some(day(2023, 4, 1)));
    }

    #[test]
    fn test_bad_date_left_empty() {
        let candidates = parse_export(EXPORT).unwrap();
        let alan = &candidates[2];
        assert_eq!(alan.fields.name, "Alan");
        assert_eq!(alan.fields.connected_on, None);
    }

    #[test]
    fn test_header_without_preamble() {
        let content = "\u{feff}First Name,Last Name,URL\nLinus,Torvalds,https://www.linkedin.com/in/linus\n";
        let candidates = parse_export(content).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].fields.name, "Linus Torvalds");
        assert_eq!(candidates[0].fields.email, "");
    }

    #[test]
    fn test_phone_numbers_column() {
        let content = "\
First Name,Last Name,URL,Email Address,Phone Numbers,Company,Position,Connected On
Ada,Lovelace,https://www.linkedin.com/in/ada,,+44 20 7946 0000,,,
Grace,Hopper,https://www.linkedin.com/in/grace,,,,,
";
        let candidates = parse_export(content).unwrap();
        assert_eq!(candidates[0].fields.phone, "+44 20 7946 0000");
        assert_eq!(candidates[1].fields.phone, "");

        // Exports without the column still parse
        assert_eq!(parse_export(EXPORT).unwrap()[0].fields.phone, "");
    }

    #[test]
    fn test_header_only_is_empty_import() {
        let content = "First Name,Last Name,URL,Email Address,Company,Position,Connected On\n";
        assert!(parse_export(content).unwrap().is_empty());
    }

    #[test]
    fn test_missing_last_name_column() {
        let content = "First Name,URL\nAda,https://www.linkedin.com/in/ada\n";
        assert_eq!(
            parse_export(content).unwrap_err(),
            SourceError::MissingColumn("Last Name".to_string())
        );
    }

    #[test]
    fn test_not_an_export() {
        assert_eq!(
            parse_export("name,email\nx,y\n").unwrap_err(),
            SourceError::MissingColumn("First Name".to_string())
        );
    }

    #[test]
    fn test_connected_on_formats() {
        assert_eq!(parse_connected_on("01 Jan 2024"), Some(day(2024, 1, 1)));
        assert_eq!(parse_connected_on(" 2024-01-01 "), Some(day(2024, 1, 1)));
        assert_eq!(parse_connected_on("Jan 1, 2024"), None);
    }

    #[tokio::test]
    async fn test_source_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();

        let candidates = LinkedInCsvSource::new().parse(file.path()).await.unwrap();
        assert_eq!(candidates.len(), 3);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LinkedInCsvSource::new()
            .parse(&dir.path().join("missing.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }
}

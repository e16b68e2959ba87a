use crate::{AllocationRecord, CallSite};
use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;

/// Live blocks allocated from one call site.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "leak-tracking", feature = "clobber"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LeakSite {
    pub file: String,
    pub line: u32,
    pub blocks: usize,
    pub bytes: usize,
}

/// Compacted listing of the live blocks of a tracker, grouped by call site.
///
/// Sites are ordered by file name, then line number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "leak-tracking", feature = "clobber"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LeakReport {
    pub total_blocks: usize,
    pub total_bytes: usize,
    pub sites: Vec<LeakSite>,
}

impl LeakReport {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = AllocationRecord>,
    {
        let mut by_site: BTreeMap<CallSite, (usize, usize)> = BTreeMap::new();
        for record in records {
            let (blocks, bytes) = by_site.entry(record.site).or_default();
            *blocks += 1;
            *bytes += record.size;
        }

        let sites: Vec<LeakSite> = by_site
            .into_iter()
            .map(|(site, (blocks, bytes))| LeakSite {
                file: site.file.to_string(),
                line: site.line,
                blocks,
                bytes,
            })
            .collect();

        Self {
            total_blocks: sites.iter().map(|s| s.blocks).sum(),
            total_bytes: sites.iter().map(|s| s.bytes).sum(),
            sites,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Output format of the built-in leak reporters.
///
/// # Examples
///
/// ```rust
/// use heapguard::{Format, TrackerBuilder};
///
/// let tracker = TrackerBuilder::new().format(Format::JsonPretty).build();
/// # let _ = tracker;
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Table,
    Json,
    JsonPretty,
}

impl Format {
    /// Format named by `HEAPGUARD_FORMAT`, if set to a known value.
    pub fn from_env() -> Option<Self> {
        std::env::var("HEAPGUARD_FORMAT")
            .ok()
            .and_then(|value| value.parse().ok())
    }

    #[cfg(any(feature = "leak-tracking", feature = "clobber"))]
    pub fn reporter(self) -> Box<dyn Reporter> {
        match self {
            Format::Table => Box::new(TableReporter),
            Format::Json => Box::new(JsonReporter),
            Format::JsonPretty => Box::new(JsonPrettyReporter),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(Format::Table),
            "json" => Ok(Format::Json),
            "json-pretty" => Ok(Format::JsonPretty),
            other => Err(format!(
                "unknown format {:?}, expected one of: \"table\", \"json\", \"json-pretty\"",
                other
            )),
        }
    }
}

/// Stream a [`ReportGuard`](crate::ReportGuard) writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Target {
    #[default]
    Stderr,
    Stdout,
}

/// Renders a [`LeakReport`].
///
/// Implement this trait to send leak reports somewhere other than the
/// built-in table and JSON renderings.
///
/// # Examples
///
/// ```rust
/// use heapguard::{LeakReport, Reporter};
/// use std::error::Error;
/// use std::io::Write;
///
/// struct CountOnly;
///
/// impl Reporter for CountOnly {
///     fn report(&self, leaks: &LeakReport, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
///         writeln!(out, "{} leaked blocks", leaks.total_blocks)?;
///         Ok(())
///     }
/// }
///
/// let mut out = Vec::new();
/// CountOnly.report(&LeakReport::default(), &mut out).unwrap();
/// assert_eq!(out, b"0 leaked blocks\n");
/// ```
pub trait Reporter: Send + Sync {
    fn report(
        &self,
        leaks: &LeakReport,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>>;
}

#[cfg(any(feature = "leak-tracking", feature = "clobber"))]
mod reporters;
#[cfg(any(feature = "leak-tracking", feature = "clobber"))]
pub use reporters::{format_bytes, JsonPrettyReporter, JsonReporter, TableReporter};

#[cfg(all(test, any(feature = "leak-tracking", feature = "clobber")))]
mod tests {
    use super::*;

    fn record(address: usize, size: usize, file: &'static str, line: u32) -> AllocationRecord {
        AllocationRecord {
            address,
            size,
            site: CallSite::new(file, line),
        }
    }

    fn sample() -> LeakReport {
        LeakReport::from_records(vec![
            record(0x30, 8, "src/parse.rs", 40),
            record(0x10, 16, "src/main.rs", 7),
            record(0x20, 24, "src/parse.rs", 40),
            record(0x40, 1, "src/main.rs", 120),
        ])
    }

    #[test]
    fn test_compaction_groups_and_orders_by_site() {
        let report = sample();

        assert_eq!(report.total_blocks, 4);
        assert_eq!(report.total_bytes, 49);
        let keys: Vec<(&str, u32, usize, usize)> = report
            .sites
            .iter()
            .map(|s| (s.file.as_str(), s.line, s.blocks, s.bytes))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("src/main.rs", 7, 1, 16),
                ("src/main.rs", 120, 1, 1),
                ("src/parse.rs", 40, 2, 32),
            ]
        );
    }

    #[test]
    fn test_table_rendering() {
        let mut out = Vec::new();
        TableReporter.report(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("[heapguard] 4 unfreed blocks (49 B) at 3 call sites"));
        assert!(text.contains("Call site"));
        assert!(text.contains("src/parse.rs:40"));
        assert!(text.contains("src/main.rs:120"));

        let main_row = text.find("src/main.rs:7").unwrap();
        let parse_row = text.find("src/parse.rs:40").unwrap();
        assert!(main_row < parse_row);
    }

    #[test]
    fn test_empty_table_rendering() {
        let mut out = Vec::new();
        TableReporter
            .report(&LeakReport::default(), &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[heapguard] no unfreed blocks\n");
    }

    #[test]
    fn test_json_rendering_deserializes() {
        let mut out = Vec::new();
        JsonReporter.report(&sample(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);

        let parsed: LeakReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_json_pretty_field_names() {
        let mut out = Vec::new();
        JsonPrettyReporter.report(&sample(), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["total_blocks"], 4);
        assert_eq!(value["sites"][2]["file"], "src/parse.rs");
        assert_eq!(value["sites"][2]["blocks"], 2);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<Format>(), Ok(Format::Json));
        assert_eq!(" JSON-Pretty ".parse::<Format>(), Ok(Format::JsonPretty));
        assert_eq!("table".parse::<Format>(), Ok(Format::Table));
        assert!("yaml".parse::<Format>().is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 << 50), "3072.0 TB");
    }
}

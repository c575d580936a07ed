use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ConsoleSink, FileSink, MultiSink, Sink, SinkError};

/// The sink backends selectable from configuration.
///
/// Written as `console` or `file:<path>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SinkKind {
    Console,
    File { path: PathBuf },
}

impl FromStr for SinkKind {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("console") => Ok(SinkKind::Console),
            Some((scheme, path)) if scheme.eq_ignore_ascii_case("file") && !path.is_empty() => {
                Ok(SinkKind::File { path: PathBuf::from(path) })
            }
            _ => Err(SinkError::InvalidKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for SinkKind {
    type Error = SinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Console => f.write_str("console"),
            SinkKind::File { path } => write!(f, "file:{}", path.display()),
        }
    }
}

impl From<SinkKind> for String {
    fn from(value: SinkKind) -> Self {
        value.to_string()
    }
}

pub fn build_sink(kind: &SinkKind) -> Box<dyn Sink> {
    match kind {
        SinkKind::Console => Box::new(ConsoleSink::new()),
        SinkKind::File { path } => Box::new(FileSink::new(path.clone())),
    }
}

/// A single sink, or a fan-out over several. An empty list means console.
pub fn build_sinks(kinds: &[SinkKind]) -> Box<dyn Sink> {
    match kinds {
        [] => build_sink(&SinkKind::Console),
        [kind] => build_sink(kind),
        kinds => Box::new(MultiSink::new(kinds.iter().map(build_sink).collect())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("console", SinkKind::Console)]
    #[case(" Console ", SinkKind::Console)]
    #[case("file:out/records.jsonl", SinkKind::File { path: "out/records.jsonl".into() })]
    fn parses_sink_kinds(#[case] raw: &str, #[case] expected: SinkKind) {
        assert_eq!(raw.parse::<SinkKind>().unwrap(), expected);
    }

    #[rstest]
    #[case("kafka")]
    #[case("file:")]
    #[case("kafka:topic")]
    fn rejects_unknown_kinds(#[case] raw: &str) {
        assert_matches!(raw.parse::<SinkKind>(), Err(SinkError::InvalidKind(_)));
    }

    #[test]
    fn serde_uses_string_form() {
        let kind = SinkKind::File { path: "a.jsonl".into() };
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"file:a.jsonl\"");
        assert_eq!(serde_json::from_str::<SinkKind>("\"console\"").unwrap(), SinkKind::Console);
    }
}

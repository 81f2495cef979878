//! Newline-delimited JSON dataset files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::error::DatasetError;
use crate::snippet::SourceRecord;

use super::{DatasetSource, RecordStream};

/// Reads one [`SourceRecord`] per non-blank line.
#[derive(Debug, Clone)]
pub struct JsonlDataset {
    name: String,
    path: PathBuf,
}

impl JsonlDataset {
    /// Builds a source over `path`, labelled `name` on stored snippets.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl DatasetSource for JsonlDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn records(&self) -> Result<RecordStream<'_>, DatasetError> {
        let file = File::open(&self.path).map_err(|err| {
            DatasetError::Unavailable(format!("failed to open {:?}: {err}", self.path))
        })?;
        let lines = BufReader::new(file).lines().enumerate();
        Ok(Box::new(lines.filter_map(|(line_no, line)| {
            let line = match line {
                Ok(line) => line,
                Err(err) => return Some(Err(DatasetError::Io(err))),
            };
            if line.trim().is_empty() {
                return None;
            }
            Some(
                serde_json::from_str::<SourceRecord>(&line).map_err(|err| {
                    DatasetError::InvalidRecord {
                        position: line_no + 1,
                        reason: err.to_string(),
                    }
                }),
            )
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_records_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"{{"messages":[{{"role":"user","content":"make a button"}}],"upvoted":true}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"messages":[],"model":"gpt-4"}}"#).unwrap();

        let dataset = JsonlDataset::new("local", file.path());
        let records: Vec<SourceRecord> = dataset
            .records()
            .expect("opens")
            .collect::<Result<_, _>>()
            .expect("decodes");
        assert_eq!(records.len(), 2);
        assert!(records[0].upvoted);
        assert_eq!(records[1].model_name(), Some("gpt-4"));
    }

    #[test]
    fn bad_line_reports_its_number() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"messages":[]}}"#).unwrap();
        writeln!(file, "not json").unwrap();

        let dataset = JsonlDataset::new("local", file.path());
        let mut stream = dataset.records().expect("opens");
        assert!(stream.next().unwrap().is_ok());
        match stream.next().unwrap() {
            Err(DatasetError::InvalidRecord { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dataset = JsonlDataset::new("local", "/nonexistent/records.jsonl");
        assert!(matches!(
            dataset.records().err(),
            Some(DatasetError::Unavailable(_))
        ));
    }
}

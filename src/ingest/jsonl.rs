//! JSON-lines trace files
//!
//! One [`Event`] per line. Blank lines and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use super::{Event, IngestError};

/// Lazily decodes events from a line-oriented reader
pub struct EventReader<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.lines.next()?;
            self.line += 1;
            let line = self.line;
            let text = match next {
                Ok(text) => text,
                Err(source) => return Some(Err(IngestError::Read { line, source })),
            };

            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some(
                serde_json::from_str(trimmed).map_err(|source| IngestError::Decode { line, source }),
            );
        }
    }
}

/// Decode events from `reader`; errors carry the 1-based line number
pub fn read_events<R: BufRead>(reader: R) -> EventReader<R> {
    EventReader {
        lines: reader.lines(),
        line: 0,
    }
}

/// Open a trace file, `-` meaning stdin
pub fn open_trace(path: &Path) -> Result<Box<dyn BufRead>, IngestError> {
    if path == Path::new("-") {
        tracing::debug!("reading trace from stdin");
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    tracing::debug!(path = %path.display(), "opening trace");
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

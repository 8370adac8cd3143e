use std::str::FromStr;

use ingest::Chunk;

use crate::config::ConfigError;

/// Which chunks of a loaded file a run processes. Selected chunks keep
/// their position in the full list, so provenance indices stay valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkSelection {
    #[default]
    All,
    /// The first `n` chunks; all of them when the file is shorter.
    Max(usize),
    Index(usize),
    /// Inclusive on both ends.
    Range { start: usize, end: usize },
}

impl ChunkSelection {
    /// Build from the command line flags. The index wins over the range,
    /// which wins over the limit. A limit of zero means no limit.
    pub fn from_flags(
        index: Option<usize>,
        range: Option<&str>,
        max: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if let Some(index) = index {
            return Ok(Self::Index(index));
        }
        if let Some(range) = range {
            return range.parse();
        }
        match max {
            Some(n) if n > 0 => Ok(Self::Max(n)),
            _ => Ok(Self::All),
        }
    }

    pub fn apply<'a>(&self, chunks: &'a [Chunk]) -> Result<Vec<(usize, &'a Chunk)>, ConfigError> {
        let indexed = chunks.iter().enumerate();
        let last = chunks.len().checked_sub(1);
        match *self {
            Self::All => Ok(indexed.collect()),
            Self::Max(n) => Ok(indexed.take(n).collect()),
            Self::Index(i) => match chunks.get(i) {
                Some(chunk) => Ok(vec![(i, chunk)]),
                None => Err(out_of_range(&format!("chunk index {i}"), last)),
            },
            Self::Range { start, end } => match last {
                Some(last) if start <= end && end <= last => {
                    Ok(indexed.skip(start).take(end - start + 1).collect())
                }
                _ => Err(out_of_range(&format!("chunk range {start}-{end}"), last)),
            },
        }
    }
}

fn out_of_range(what: &str, last: Option<usize>) -> ConfigError {
    match last {
        Some(last) => ConfigError::ChunkSelection(format!("{what} is out of range (0-{last})")),
        None => ConfigError::ChunkSelection(format!("{what} is out of range (no chunks loaded)")),
    }
}

impl FromStr for ChunkSelection {
    type Err = ConfigError;

    /// Parses `start-end`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ConfigError::ChunkSelection(format!(
                "invalid chunk range format: {s}. Use 'start-end' format (e.g., '0-5')"
            ))
        };
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start = start.trim().parse().map_err(|_| invalid())?;
        let end = end.trim().parse().map_err(|_| invalid())?;
        Ok(Self::Range { start, end })
    }
}

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use framescope_types::{FRAME_INDEX_WIDTH, Frame};
use tokio::fs;

pub const FRAME_PREFIX: &str = "frame_";

/// Ordered, append-only list of frame image filenames in one directory.
///
/// Decoders number frames with a fixed zero-padded width, so ordering by
/// name matches temporal order. Names wider than the padding (sequence
/// numbers past 9999) sort after every narrower name.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    directory: PathBuf,
    filenames: Vec<String>,
}

impl FrameSequence {
    pub fn from_filenames<I, S>(directory: impl Into<PathBuf>, extension: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filenames: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|name| is_frame_file(name, extension))
            .collect();
        filenames.sort_by(|a, b| compare_frame_names(a, b));
        filenames.dedup();
        Self {
            directory: directory.into(),
            filenames,
        }
    }

    /// Lists the frame files with `extension` in `directory`. A missing
    /// directory yields an empty sequence.
    pub async fn scan(directory: &Path, extension: &str) -> std::io::Result<Self> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::from_filenames(directory, extension, names));
            }
            Err(err) => return Err(err),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(Self::from_filenames(directory, extension, names))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.filenames.iter().map(|name| self.directory.join(name))
    }

    /// Frame records in sequence order; ids and timestamps come from the
    /// position in the sequence only.
    pub fn frames(&self, video_id: &str, interval_seconds: f64) -> Vec<Frame> {
        self.paths()
            .enumerate()
            .map(|(index, path)| Frame::from_sequence(video_id, index, interval_seconds, path))
            .collect()
    }
}

/// printf-style output pattern handed to the decoder process.
pub fn output_pattern(extension: &str) -> String {
    format!("{FRAME_PREFIX}%0{FRAME_INDEX_WIDTH}d.{extension}")
}

/// Filename of the frame with the 1-based `sequence_number`.
pub fn frame_filename(sequence_number: usize, extension: &str) -> String {
    format!(
        "{FRAME_PREFIX}{sequence_number:0width$}.{extension}",
        width = FRAME_INDEX_WIDTH
    )
}

fn is_frame_file(name: &str, extension: &str) -> bool {
    let Some(stem) = name.strip_prefix(FRAME_PREFIX) else {
        return false;
    };
    let Some((digits, ext)) = stem.rsplit_once('.') else {
        return false;
    };
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && ext.eq_ignore_ascii_case(extension)
}

fn compare_frame_names(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

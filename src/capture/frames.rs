use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One sampled snapshot of the session's visual surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Position in the run's capture sequence, strictly increasing
    pub index: u64,

    /// When the capture completed
    pub captured_at: DateTime<Utc>,

    /// Path to the stored PNG
    pub image_path: PathBuf,
}

/// Ordered, append-only record of the frames captured during one run.
///
/// The store assigns indices itself, so every appended frame has a larger
/// index than the one before it.
#[derive(Debug, Clone, Default)]
pub struct FrameStore {
    frames: Vec<Frame>,
    next_index: u64,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next appended frame will receive
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Append a frame captured at `captured_at` and stored at `image_path`
    pub fn append(&mut self, image_path: PathBuf, captured_at: DateTime<Utc>) -> &Frame {
        let index = self.next_index;
        self.next_index += 1;
        self.frames.push(Frame {
            index,
            captured_at,
            image_path,
        });
        &self.frames[self.frames.len() - 1]
    }

    /// Skip an index without appending (used when a capture fails)
    pub fn skip(&mut self) {
        self.next_index += 1;
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Paths of all frames in index order
    pub fn image_paths(&self) -> Vec<&Path> {
        self.frames.iter().map(|f| f.image_path.as_path()).collect()
    }
}

/// File path for the frame with the given index
pub fn frame_path(frame_dir: &Path, index: u64) -> PathBuf {
    frame_dir.join(format!("frame_{:05}.png", index))
}

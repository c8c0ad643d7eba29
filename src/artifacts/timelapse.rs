//! Timelapse rendering from captured frames.
//!
//! Frames are streamed into the GIF one at a time so long runs do not
//! need every frame in memory at once.

use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{Delay, Frame as GifFrame, RgbaImage};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use super::ArtifactResult;

/// Display time of each frame (1 frame per second)
pub const FRAME_DELAY_MS: u32 = 1000;

/// Fewer usable frames than this produce no timelapse
pub const MIN_TIMELAPSE_FRAMES: usize = 2;

/// NeuQuant speed passed to the GIF encoder (1 = best, 30 = fastest)
const GIF_ENCODER_SPEED: i32 = 10;

/// Summary of a written timelapse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelapseInfo {
    /// Frames encoded
    pub frames: usize,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

/// Render `frame_paths` (in order) into a GIF at `output`.
///
/// Missing or unreadable frames are skipped. The first readable frame
/// fixes the output size; later frames are resized to match with
/// nearest-neighbour sampling. Returns `Ok(None)` without writing
/// anything when fewer than [`MIN_TIMELAPSE_FRAMES`] frames are usable.
pub fn render_timelapse<P: AsRef<Path>>(
    frame_paths: &[P],
    output: &Path,
) -> ArtifactResult<Option<TimelapseInfo>> {
    let mut readable = frame_paths.iter().filter_map(|p| load_frame(p.as_ref()));

    let Some(first) = readable.next() else {
        debug!("no readable frames, skipping timelapse");
        return Ok(None);
    };
    let (width, height) = first.dimensions();
    let mut normalized = readable.map(|img| normalize(img, width, height));
    let Some(second) = normalized.next() else {
        debug!("single readable frame, skipping timelapse");
        return Ok(None);
    };

    let result = encode(output, [first, second].into_iter().chain(normalized));
    match result {
        Ok(frames) => Ok(Some(TimelapseInfo {
            frames,
            width,
            height,
        })),
        Err(e) => {
            let _ = fs::remove_file(output);
            Err(e)
        }
    }
}

fn encode(output: &Path, frames: impl Iterator<Item = RgbaImage>) -> ArtifactResult<usize> {
    let mut writer = BufWriter::new(File::create(output)?);
    let mut count = 0;
    {
        let mut encoder = GifEncoder::new_with_speed(&mut writer, GIF_ENCODER_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;
        let delay = Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1);
        for image in frames {
            encoder.encode_frame(GifFrame::from_parts(image, 0, 0, delay))?;
            count += 1;
        }
    }
    writer.flush()?;
    Ok(count)
}

fn load_frame(path: &Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(img) => Some(img.to_rgba8()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping unreadable frame");
            None
        }
    }
}

fn normalize(img: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        image::imageops::resize(&img, width, height, FilterType::Nearest)
    }
}

use std::path::Path;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Frame count implied by the input size, rounding a partial last frame up.
pub fn estimate_total_frames(input_path: &Path, frame_bytes: usize) -> Result<u64> {
    let bytes = std::fs::metadata(input_path)?.len();
    let frames = bytes.div_ceil(frame_bytes.max(1) as u64);

    log::debug!("Estimated {frames} frames from {bytes} bytes of input");
    Ok(frames)
}

pub fn create_progress_bar(
    multi: &MultiProgress,
    total_frames: Option<u64>,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_frames {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);

        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}",
        )?);

        pb
    };
    pb.set_message("initializing decoder");
    Ok(pb)
}

pub mod progress;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use dtvcc::process::stage::{DecoderConfig, DtvccDecoder};
use dtvcc::utils::buffer_pool::BufferPool;
use dtvcc::utils::sinks::Sinks;
use indicatif::MultiProgress;
use log::Level;

use super::command::{Cli, DecodeArgs};
use crate::events::EventWriter;
use crate::input::{FrameSource, InputReader, is_pipe};
use self::progress::{create_progress_bar, estimate_total_frames};

fn create_path_with_extension(base_path: &Path, expected_ext: &str) -> PathBuf {
    match base_path.extension() {
        Some(ext) if ext == expected_ext => base_path.to_path_buf(),
        Some(_) => {
            let mut name = base_path.as_os_str().to_os_string();
            name.push(".");
            name.push(expected_ext);
            PathBuf::from(name)
        }
        None => base_path.with_extension(expected_ext),
    }
}

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Decoding DTVCC captions: {} (strict mode: {}, {} fps{})",
        args.input.display(),
        cli.strict,
        args.frames.framerate,
        if args.frames.drop_frame { ", drop frame" } else { "" },
    );

    let writer: Box<dyn Write> = match &args.output_path {
        Some(path) => {
            let path = create_path_with_extension(path, "yaml");
            log::info!("Writing caption events to {}", path.display());
            Box::new(BufWriter::new(File::create(path)?))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let pool = BufferPool::default();
    let mut decoder = DtvccDecoder::new(
        pool.clone(),
        DecoderConfig {
            process_only: false,
            fail_level: cli.fail_level(),
        },
    );
    if !decoder.add_sink(Box::new(EventWriter::new(writer, args.service)))? {
        bail!("Could not attach the event writer to the DTVCC decoder");
    }

    let mut source = Sinks::<u8>::default();
    if !source.add(Box::new(decoder))? {
        bail!("Could not attach the DTVCC decoder to the input");
    }

    let total_frames = if multi.is_some() && !is_pipe(&args.input) {
        Some(estimate_total_frames(&args.input, args.frames.frame_bytes())?)
    } else {
        None
    };
    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, total_frames)?),
        None => None,
    };

    let mut frames = FrameSource::new(
        InputReader::new(&args.input)?,
        args.frames.frame_bytes(),
        args.frames.framerate,
        args.frames.drop_frame,
    );

    let start_time = std::time::Instant::now();
    let mut success = true;

    while let Some(buffer) = frames.next_frame(&pool)? {
        let time = *buffer.caption_time();
        success &= source.dispatch(buffer)?;

        if let Some(ref pb) = pb {
            pb.set_position(frames.frames());
            if frames.frames().is_multiple_of(100) {
                pb.set_message(format!("decoding at {time}"));
            }
        }
    }

    success &= source.shutdown()?;
    pool.check_drained(Level::Warn);

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    log::info!(
        "Decoded {} frames in {:.2}s",
        frames.frames(),
        start_time.elapsed().as_secs_f64()
    );

    if !success {
        bail!("Decoding finished with errors, see the log for details");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_extension() {
        assert_eq!(
            create_path_with_extension(Path::new("out/captions"), "yaml"),
            PathBuf::from("out/captions.yaml")
        );
        assert_eq!(
            create_path_with_extension(Path::new("captions.yaml"), "yaml"),
            PathBuf::from("captions.yaml")
        );
        assert_eq!(
            create_path_with_extension(Path::new("show.708"), "yaml"),
            PathBuf::from("show.708.yaml")
        );
    }
}

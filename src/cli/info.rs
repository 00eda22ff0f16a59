use anyhow::Result;
use dtvcc::process::stage::{DecoderConfig, DtvccDecoder, Diagnostics};
use dtvcc::structs::timestamp::CaptionTime;
use dtvcc::utils::buffer_pool::BufferPool;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;

use super::command::{Cli, InfoArgs};
use crate::input::{FrameSource, InputReader};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing DTVCC captions: {}", args.input.display());

    let pool = BufferPool::default();
    let mut decoder = DtvccDecoder::new(
        pool.clone(),
        DecoderConfig {
            process_only: true,
            fail_level: cli.fail_level(),
        },
    );

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_message("Analyzing frames...");
            Some(pb)
        }
        None => None,
    };

    let mut frames = FrameSource::new(
        InputReader::new(&args.input)?,
        args.frames.frame_bytes(),
        args.frames.framerate,
        args.frames.drop_frame,
    );
    let mut total_bytes = 0;

    while let Some(buffer) = frames.next_frame(&pool)? {
        total_bytes += buffer.len();
        decoder.process(&buffer)?;
        buffer.release()?;

        if frames.frames().is_multiple_of(100) {
            if let Some(ref pb) = pb {
                pb.set_message(format!("Analyzing frames...       {}", frames.frames()));
            }
        }
    }
    decoder.finish()?;
    pool.check_drained(Level::Warn);

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let duration = CaptionTime::from_frame_number(
        frames.frames(),
        args.frames.framerate,
        args.frames.drop_frame,
    );
    let summary = Summary {
        frames: frames.frames(),
        total_bytes,
        duration,
        first_text_found: decoder.first_text_found(),
    };
    display_summary(&summary, &decoder.diagnostics());

    Ok(())
}

struct Summary {
    frames: u64,
    total_bytes: usize,
    duration: CaptionTime,
    first_text_found: bool,
}

fn display_summary(summary: &Summary, diagnostics: &Diagnostics) {
    println!();
    println!("DTVCC Stream Information");
    println!("========================");
    println!();
    println!("Input");
    println!("  Frames processed          {}", summary.frames);
    println!("  Size                      {} bytes", summary.total_bytes);
    println!("  Duration                  {}", summary.duration);
    println!("  Text found                {}", summary.first_text_found);
    println!();

    let services = diagnostics
        .active_service_numbers()
        .map(|service| service.to_string())
        .collect::<Vec<_>>();
    println!("Services");
    if services.is_empty() {
        println!("  No caption services carried data");
    } else {
        println!("  Active services           {}", services.join(", "));
    }
    println!();

    println!("Decoder Summary");
    for line in diagnostics.to_string().lines() {
        println!("  {line}");
    }
    println!();
}

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::Result;
use dtvcc::structs::timestamp::{CaptionTime, Framerate};
use dtvcc::utils::buffer_pool::{Buffer, BufferPool};

/// Unified input reader that handles both file and pipe input with buffered reading
pub struct InputReader {
    reader: Box<dyn Read>,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let reader: Box<dyn Read> = if is_pipe(input_path.as_ref()) {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(input_path)?;
            Box::new(BufReader::new(file))
        };

        Ok(Self { reader })
    }

    pub fn from_reader(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }

    /// Fills `buffer` as far as the input allows.
    /// Returns the number of bytes read; anything short of the buffer length means EOF
    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Check if the path names stdin
pub fn is_pipe(input_path: &Path) -> bool {
    input_path.as_os_str() == "-"
}

/// Cuts the input into per-frame pooled buffers of cc_data, each labelled
/// with the timecode of its frame.
pub struct FrameSource {
    reader: InputReader,
    chunk: Vec<u8>,
    framerate: Framerate,
    drop_frame: bool,
    frame_number: u64,
}

impl FrameSource {
    pub fn new(
        reader: InputReader,
        frame_bytes: usize,
        framerate: Framerate,
        drop_frame: bool,
    ) -> Self {
        Self {
            reader,
            chunk: vec![0u8; frame_bytes],
            framerate,
            drop_frame,
            frame_number: 0,
        }
    }

    /// Frames read so far.
    pub fn frames(&self) -> u64 {
        self.frame_number
    }

    /// Reads the next frame into a buffer from `pool`, `None` at end of input.
    pub fn next_frame(&mut self, pool: &BufferPool) -> Result<Option<Buffer<u8>>> {
        let bytes_read = self.reader.read_chunk(&mut self.chunk)?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let time =
            CaptionTime::from_frame_number(self.frame_number, self.framerate, self.drop_frame);
        self.frame_number += 1;

        let mut buffer = pool.allocate::<u8>(bytes_read, time)?;
        buffer.extend_from_slice(&self.chunk[..bytes_read])?;
        Ok(Some(buffer))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Hands out at most two bytes per read.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(2);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn frames_are_filled_across_short_reads() -> Result<()> {
        let data: Vec<u8> = (0..15).collect();
        let reader = InputReader::from_reader(Box::new(Trickle(Cursor::new(data))));
        let mut source = FrameSource::new(reader, 6, Framerate::R30, false);
        let pool = BufferPool::default();

        let mut frames = Vec::new();
        while let Some(buffer) = source.next_frame(&pool)? {
            frames.push((buffer.elements().to_vec(), buffer.caption_time().to_string()));
        }

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].0, [0, 1, 2, 3, 4, 5]);
        assert_eq!(frames[2].0, [12, 13, 14]);
        assert_eq!(frames[1].1, "00:00:00:01");
        assert_eq!(source.frames(), 3);
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }

    #[test]
    fn stdin_is_a_pipe() {
        assert!(is_pipe(Path::new("-")));
        assert!(!is_pipe(Path::new("captions.bin")));
    }
}

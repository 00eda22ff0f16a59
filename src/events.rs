use std::io::Write;

use anyhow::Result;
use dtvcc::structs::unit::{DecodedUnit, render};
use dtvcc::utils::buffer_pool::{Buffer, DataType};
use dtvcc::utils::sinks::{LinkInfo, Sink};
use log::{error, info};
use serde::{Deserialize, Serialize};

/// One service block worth of decoded units.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Event {
    pub time: String,
    pub service: u8,
    pub sequence: u8,
    pub text: String,
    pub units: Vec<String>,
}

impl Event {
    pub fn from_units(time: String, units: &[DecodedUnit]) -> Option<Self> {
        let first = units.first()?;

        Some(Self {
            time,
            service: first.service_number,
            sequence: first.sequence_number,
            text: render(units),
            units: units
                .iter()
                .map(|unit| format!("{} {}", unit.payload.kind(), unit.payload))
                .collect(),
        })
    }
}

/// Writes every buffer it receives as a YAML document.
pub struct EventWriter<W: Write> {
    writer: W,
    service: Option<u8>,
    events: usize,
    failed: bool,
}

impl<W: Write> EventWriter<W> {
    /// `service` restricts the dump to one caption service.
    pub fn new(writer: W, service: Option<u8>) -> Self {
        Self {
            writer,
            service,
            events: 0,
            failed: false,
        }
    }

    pub fn events(&self) -> usize {
        self.events
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &Event) -> Result<()> {
        let yaml = serde_yaml_ng::to_string(event)?;
        self.writer.write_all(b"---\n")?;
        self.writer.write_all(yaml.as_bytes())?;
        Ok(())
    }
}

impl<W: Write> Sink<DecodedUnit> for EventWriter<W> {
    fn link(&self) -> LinkInfo {
        LinkInfo {
            name: "YAML Event Writer",
            consumes: DataType::Dtvcc,
            produces: None,
        }
    }

    fn accept(&mut self, buffer: Buffer<DecodedUnit>) -> Result<bool> {
        if self.failed {
            return Ok(false);
        }

        let units: Vec<DecodedUnit> = buffer
            .elements()
            .iter()
            .filter(|unit| self.service.is_none_or(|s| s == unit.service_number))
            .copied()
            .collect();

        let Some(event) = Event::from_units(buffer.caption_time().to_string(), &units) else {
            return Ok(true);
        };

        if let Err(e) = self.write_event(&event) {
            error!("Failed to write caption event at {}: {e}", event.time);
            self.failed = true;
            return Ok(false);
        }
        self.events += 1;
        Ok(true)
    }

    fn terminate(&mut self) -> Result<bool> {
        if let Err(e) = self.writer.flush() {
            error!("Failed to flush caption events: {e}");
            return Ok(false);
        }
        info!("Wrote {} caption events", self.events);
        Ok(!self.failed)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use dtvcc::structs::command::C0Command;
    use dtvcc::structs::timestamp::{CaptionTime, Framerate};
    use dtvcc::structs::unit::Payload;
    use dtvcc::utils::buffer_pool::BufferPool;

    use super::*;

    fn block(pool: &BufferPool, service: u8, text: &str) -> Result<Buffer<DecodedUnit>> {
        let time = CaptionTime::from_frame_number(31, Framerate::R30, false);
        let mut buffer = pool.allocate::<DecodedUnit>(text.len() + 1, time)?;
        for byte in text.bytes() {
            buffer.push(DecodedUnit {
                sequence_number: 2,
                service_number: service,
                payload: Payload::G0(byte),
            })?;
        }
        buffer.push(DecodedUnit {
            sequence_number: 2,
            service_number: service,
            payload: Payload::C0(C0Command::Cr),
        })?;
        Ok(buffer)
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn events_are_yaml_documents() -> Result<()> {
        let pool = BufferPool::default();
        let mut writer = EventWriter::new(Vec::new(), None);

        assert!(writer.accept(block(&pool, 1, "Hi")?)?);
        assert!(writer.accept(block(&pool, 2, "Yo")?)?);
        assert!(writer.terminate()?);
        assert_eq!(writer.events(), 2);
        assert_eq!(pool.allocated(), 0);

        let text = String::from_utf8(writer.into_inner())?;
        let documents: Vec<&str> = text.split("---\n").filter(|doc| !doc.is_empty()).collect();
        assert_eq!(documents.len(), 2);

        let first: Event = serde_yaml_ng::from_str(documents[0])?;
        assert_eq!(
            first,
            Event {
                time: "00:00:01:01".to_string(),
                service: 1,
                sequence: 2,
                text: "Hi{CR}".to_string(),
                units: vec!["G0 H".to_string(), "G0 i".to_string(), "C0 {CR}".to_string()],
            }
        );
        Ok(())
    }

    #[test]
    fn service_filter() -> Result<()> {
        let pool = BufferPool::default();
        let mut writer = EventWriter::new(Vec::new(), Some(2));

        assert!(writer.accept(block(&pool, 1, "Hi")?)?);
        assert!(writer.accept(block(&pool, 2, "Yo")?)?);
        assert_eq!(writer.events(), 1);

        let text = String::from_utf8(writer.into_inner())?;
        assert!(text.contains("service: 2"));
        assert!(!text.contains("service: 1"));
        Ok(())
    }

    #[test]
    fn write_failure_is_reported() -> Result<()> {
        let pool = BufferPool::default();
        let mut writer = EventWriter::new(Broken, None);

        assert!(!writer.accept(block(&pool, 1, "Hi")?)?);
        assert!(!writer.accept(block(&pool, 1, "Hi")?)?);
        assert!(!writer.terminate()?);
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }
}

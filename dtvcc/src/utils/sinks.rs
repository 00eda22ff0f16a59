//! Sink registry and buffer fan-out.
//!
//! A producing stage owns one [`Sinks`] list. Every buffer it dispatches is
//! handed to each registered sink in registration order, as an extra reader
//! of the same pooled buffer. Sink failures are collected, never short
//! circuited; pool errors are fatal and propagate immediately.

use anyhow::Result;
use log::{debug, error};

use crate::utils::buffer_pool::{Buffer, BufferElement, DataType};
use crate::utils::errors::SinkError;

/// Maximum number of sinks one stage may feed.
pub const MAX_NUMBER_OF_SINKS: usize = 5;

/// Data types a sink declares when it is wired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    pub name: &'static str,
    pub consumes: DataType,
    pub produces: Option<DataType>,
}

/// A downstream consumer of pooled buffers.
///
/// `Ok(false)` reports a failure that does not stop the pipeline. `Err` is
/// reserved for fatal conditions such as pool exhaustion.
pub trait Sink<T: BufferElement> {
    fn link(&self) -> LinkInfo;

    /// Consumes one reader handle. The handle is released when dropped.
    fn accept(&mut self, buffer: Buffer<T>) -> Result<bool>;

    /// End of stream.
    fn terminate(&mut self) -> Result<bool>;
}

pub struct Sinks<T: BufferElement> {
    sinks: Vec<Box<dyn Sink<T>>>,
}

impl<T: BufferElement> Default for Sinks<T> {
    fn default() -> Self {
        Self {
            sinks: Vec::with_capacity(MAX_NUMBER_OF_SINKS),
        }
    }
}

impl<T: BufferElement> Sinks<T> {
    /// Registers a sink after checking that it consumes what this link carries.
    ///
    /// Returns `Ok(false)` for a refused (logged) type mismatch. Exceeding
    /// [`MAX_NUMBER_OF_SINKS`] is an error.
    pub fn add(&mut self, sink: Box<dyn Sink<T>>) -> Result<bool, SinkError> {
        let link = sink.link();

        if link.consumes != T::DATA_TYPE {
            error!(
                "{}",
                SinkError::TypeMismatch {
                    name: link.name,
                    consumes: link.consumes,
                    carries: T::DATA_TYPE,
                }
            );
            return Ok(false);
        }

        if self.sinks.len() >= MAX_NUMBER_OF_SINKS {
            return Err(SinkError::TooManySinks {
                name: link.name,
                max: MAX_NUMBER_OF_SINKS,
            });
        }

        debug!(
            "Linked sink {} ({:?} -> {:?})",
            link.name, link.consumes, link.produces
        );
        self.sinks.push(sink);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn links(&self) -> impl Iterator<Item = LinkInfo> + '_ {
        self.sinks.iter().map(|sink| sink.link())
    }

    /// Delivers `buffer` to every sink and gives up the producer's reference.
    ///
    /// One reader is added per sink before any sink runs. Returns `true` only
    /// if every sink accepted the buffer.
    pub fn dispatch(&mut self, buffer: Buffer<T>) -> Result<bool> {
        if self.sinks.is_empty() {
            error!(
                "No sinks registered for {:?} buffer {}, dropping it",
                T::DATA_TYPE,
                buffer.index()
            );
            buffer.release()?;
            return Ok(false);
        }

        let readers = self
            .sinks
            .iter()
            .map(|_| buffer.add_reader())
            .collect::<Result<Vec<_>, _>>()?;
        buffer.release()?;

        let mut success = true;
        for (sink, reader) in self.sinks.iter_mut().zip(readers) {
            if !sink.accept(reader)? {
                error!("Sink {} failed to accept buffer", sink.link().name);
                success = false;
            }
        }

        Ok(success)
    }

    /// Terminates every sink in order, aggregating their results.
    pub fn shutdown(&mut self) -> Result<bool> {
        let mut success = true;
        for sink in self.sinks.iter_mut() {
            if !sink.terminate()? {
                error!("Sink {} failed to terminate", sink.link().name);
                success = false;
            }
        }
        Ok(success)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::structs::timestamp::CaptionTime;
    use crate::utils::buffer_pool::BufferPool;

    /// Records what it receives into a shared log.
    pub(crate) struct CaptureSink<T> {
        pub name: &'static str,
        pub consumes: DataType,
        pub fail: bool,
        pub received: Rc<RefCell<Vec<Vec<T>>>>,
        pub calls: Rc<RefCell<Vec<&'static str>>>,
        pub terminated: Rc<RefCell<bool>>,
    }

    impl<T: BufferElement + Clone> CaptureSink<T> {
        pub(crate) fn new(name: &'static str, calls: &Rc<RefCell<Vec<&'static str>>>) -> Self {
            Self {
                name,
                consumes: T::DATA_TYPE,
                fail: false,
                received: Rc::default(),
                calls: Rc::clone(calls),
                terminated: Rc::default(),
            }
        }
    }

    impl<T: BufferElement + Clone> Sink<T> for CaptureSink<T> {
        fn link(&self) -> LinkInfo {
            LinkInfo {
                name: self.name,
                consumes: self.consumes,
                produces: None,
            }
        }

        fn accept(&mut self, buffer: Buffer<T>) -> Result<bool> {
            self.calls.borrow_mut().push(self.name);
            self.received.borrow_mut().push(buffer.elements().to_vec());
            Ok(!self.fail)
        }

        fn terminate(&mut self) -> Result<bool> {
            *self.terminated.borrow_mut() = true;
            Ok(!self.fail)
        }
    }

    #[test]
    fn failing_sink_does_not_stop_delivery() -> Result<()> {
        let pool = BufferPool::default();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut sinks = Sinks::<u8>::default();

        let first = CaptureSink::<u8>::new("first", &calls);
        let mut second = CaptureSink::<u8>::new("second", &calls);
        second.fail = true;
        let third = CaptureSink::<u8>::new("third", &calls);
        let third_received = Rc::clone(&third.received);

        for sink in [first, second, third] {
            assert!(sinks.add(Box::new(sink))?);
        }

        let mut buffer = pool.allocate::<u8>(3, CaptionTime::default())?;
        buffer.extend_from_slice(&[0xFF, 0x02, 0x21])?;

        assert!(!sinks.dispatch(buffer)?);
        assert_eq!(*calls.borrow(), ["first", "second", "third"]);
        assert_eq!(*third_received.borrow(), [vec![0xFF, 0x02, 0x21]]);
        assert_eq!(pool.allocated(), 0);

        assert!(!sinks.shutdown()?);
        Ok(())
    }

    #[test]
    fn all_sinks_share_one_buffer() -> Result<()> {
        let pool = BufferPool::new(1);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut sinks = Sinks::<u8>::default();
        sinks.add(Box::new(CaptureSink::<u8>::new("a", &calls)))?;
        sinks.add(Box::new(CaptureSink::<u8>::new("b", &calls)))?;

        // A one-entry pool proves no second buffer is allocated for the fan-out.
        let mut buffer = pool.allocate::<u8>(1, CaptionTime::default())?;
        buffer.push(0x42)?;
        assert!(sinks.dispatch(buffer)?);
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }

    #[test]
    fn registration_checks() -> Result<()> {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut sinks = Sinks::<u8>::default();

        let mut wrong = CaptureSink::<u8>::new("wrong", &calls);
        wrong.consumes = DataType::Dtvcc;
        assert!(!sinks.add(Box::new(wrong))?);
        assert!(sinks.is_empty());

        for _ in 0..MAX_NUMBER_OF_SINKS {
            assert!(sinks.add(Box::new(CaptureSink::<u8>::new("ok", &calls)))?);
        }
        let err = sinks
            .add(Box::new(CaptureSink::<u8>::new("extra", &calls)))
            .unwrap_err();
        assert!(matches!(err, SinkError::TooManySinks { max: 5, .. }));
        Ok(())
    }

    #[test]
    fn dispatch_without_sinks() -> Result<()> {
        let pool = BufferPool::default();
        let mut sinks = Sinks::<u8>::default();
        let buffer = pool.allocate::<u8>(3, CaptionTime::default())?;

        assert!(!sinks.dispatch(buffer)?);
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }
}

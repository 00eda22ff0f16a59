use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{Level, log, trace};

use crate::structs::timestamp::CaptionTime;
use crate::utils::errors::PoolError;

/// Number of entries in the default pool table.
pub const MAX_BUFFER_ARRAY_SIZE: usize = 10;

/// Kind of content carried by a buffer or expected by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Raw `cc_data` constructs, three bytes each.
    CcData,
    /// Decoded DTVCC units.
    Dtvcc,
}

/// Element type that can be stored in a pooled [`Buffer`].
pub trait BufferElement: fmt::Debug + 'static {
    const DATA_TYPE: DataType;
}

impl BufferElement for u8 {
    const DATA_TYPE: DataType = DataType::CcData;
}

/// Outcome of giving up one reference to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other holders remain; carries the remaining reader count.
    Retained(usize),
    /// This was the last reference and the pool entry is free again.
    Freed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    index: usize,
    serial: u64,
}

#[derive(Debug, Clone, Copy)]
struct PoolEntry {
    serial: u64,
    data_type: DataType,
    readers: usize,
    max_elements: usize,
    allocated_at: &'static Location<'static>,
}

#[derive(Debug)]
struct PoolTable {
    entries: Vec<Option<PoolEntry>>,
    next_serial: u64,
}

impl PoolTable {
    fn entry_mut(&mut self, slot: Slot) -> Result<&mut PoolEntry, PoolError> {
        self.entries
            .get_mut(slot.index)
            .and_then(Option::as_mut)
            .filter(|entry| entry.serial == slot.serial)
            .ok_or(PoolError::NotAllocated(slot.index))
    }
}

/// A fixed-size table of reference-counted buffers.
///
/// The table never grows: once every entry is in use, further allocations
/// fail with [`PoolError::Exhausted`]. Handles are cheap to clone and all
/// clones share the same table.
#[derive(Debug, Clone)]
pub struct BufferPool {
    table: Arc<Mutex<PoolTable>>,
}

impl BufferPool {
    /// Creates a pool with room for `entries` live buffers.
    pub fn new(entries: usize) -> Self {
        Self {
            table: Arc::new(Mutex::new(PoolTable {
                entries: vec![None; entries],
                next_serial: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a buffer able to hold `max_elements` elements of `T`.
    ///
    /// The returned handle counts as the first reader. The caller's source
    /// location is recorded for [`BufferPool::dump`].
    #[track_caller]
    pub fn allocate<T: BufferElement>(
        &self,
        max_elements: usize,
        caption_time: CaptionTime,
    ) -> Result<Buffer<T>, PoolError> {
        let allocated_at = Location::caller();

        if max_elements == 0 {
            return Err(PoolError::ZeroCapacity(T::DATA_TYPE));
        }

        let mut table = self.lock();
        let Some(index) = table.entries.iter().position(Option::is_none) else {
            let size = table.entries.len();
            drop(table);
            self.dump(Level::Error);
            return Err(PoolError::Exhausted(size));
        };

        let serial = table.next_serial;
        table.next_serial += 1;
        table.entries[index] = Some(PoolEntry {
            serial,
            data_type: T::DATA_TYPE,
            readers: 1,
            max_elements,
            allocated_at,
        });
        drop(table);

        trace!(
            "Allocated {:?} buffer {index} for {max_elements} elements at {allocated_at}",
            T::DATA_TYPE
        );

        Ok(Buffer {
            pool: self.clone(),
            slot: Slot { index, serial },
            content: Arc::new(Content {
                caption_time,
                elements: Vec::with_capacity(max_elements),
                max_elements,
            }),
            live: true,
        })
    }

    /// Number of entries currently in use.
    pub fn allocated(&self) -> usize {
        self.lock().entries.iter().flatten().count()
    }

    /// Total number of entries in the table.
    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    /// Checks that every buffer has been given back, dumping the table at
    /// `level` if not.
    pub fn check_drained(&self, level: Level) -> bool {
        let allocated = self.allocated();
        if allocated == 0 {
            return true;
        }
        log!(level, "{allocated} buffers still in use at end of pipeline");
        self.dump(level);
        false
    }

    /// Logs every live entry at `level`.
    pub fn dump(&self, level: Level) {
        let table = self.lock();
        log!(
            level,
            "Buffer pool: {} of {} entries in use",
            table.entries.iter().flatten().count(),
            table.entries.len()
        );
        for (index, entry) in table.entries.iter().enumerate() {
            if let Some(entry) = entry {
                log!(
                    level,
                    "  [{index}] {:?}, {} readers, {} elements max, allocated at {}",
                    entry.data_type,
                    entry.readers,
                    entry.max_elements,
                    entry.allocated_at
                );
            }
        }
    }

    fn readers(&self, slot: Slot) -> Result<usize, PoolError> {
        self.lock().entry_mut(slot).map(|entry| entry.readers)
    }

    fn add_reader(&self, slot: Slot) -> Result<usize, PoolError> {
        let mut table = self.lock();
        let entry = table.entry_mut(slot)?;
        entry.readers += 1;
        Ok(entry.readers)
    }

    fn release(&self, slot: Slot) -> Result<Release, PoolError> {
        let mut table = self.lock();
        let entry = table.entry_mut(slot)?;
        let readers = entry.readers;

        match readers {
            0 => Err(PoolError::ReaderUnderflow(slot.index)),
            1 => {
                table.entries[slot.index] = None;
                trace!("Freed buffer {}", slot.index);
                Ok(Release::Freed)
            }
            _ => {
                entry.readers -= 1;
                Ok(Release::Retained(entry.readers))
            }
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(MAX_BUFFER_ARRAY_SIZE)
    }
}

#[derive(Debug)]
struct Content<T> {
    caption_time: CaptionTime,
    elements: Vec<T>,
    max_elements: usize,
}

/// One reference to a pooled buffer.
///
/// The handle returned by [`BufferPool::allocate`] is the producer's and is
/// the only one allowed to write. [`Buffer::add_reader`] hands out further
/// read-only handles; every handle gives its reference back exactly once,
/// either through [`Buffer::release`] or when dropped.
#[derive(Debug)]
pub struct Buffer<T: BufferElement> {
    pool: BufferPool,
    slot: Slot,
    content: Arc<Content<T>>,
    live: bool,
}

impl<T: BufferElement> Buffer<T> {
    pub fn caption_time(&self) -> &CaptionTime {
        &self.content.caption_time
    }

    pub fn elements(&self) -> &[T] {
        &self.content.elements
    }

    pub fn len(&self) -> usize {
        self.content.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.elements.is_empty()
    }

    pub fn max_elements(&self) -> usize {
        self.content.max_elements
    }

    pub fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    /// Pool entry backing this buffer.
    pub fn index(&self) -> usize {
        self.slot.index
    }

    /// Current reader count, or 0 if the entry has already been freed.
    pub fn readers(&self) -> usize {
        self.pool.readers(self.slot).unwrap_or(0)
    }

    /// Appends one element. Fails once the buffer is full or has been shared.
    pub fn push(&mut self, element: T) -> Result<(), PoolError> {
        let index = self.slot.index;
        let content = Arc::get_mut(&mut self.content).ok_or(PoolError::SharedWrite(index))?;

        if content.elements.len() >= content.max_elements {
            return Err(PoolError::CapacityExceeded {
                index,
                max: content.max_elements,
            });
        }

        content.elements.push(element);
        Ok(())
    }

    pub fn extend_from_slice(&mut self, elements: &[T]) -> Result<(), PoolError>
    where
        T: Clone,
    {
        elements.iter().try_for_each(|element| self.push(element.clone()))
    }

    /// Registers one more reader and returns its handle.
    pub fn add_reader(&self) -> Result<Self, PoolError> {
        let readers = self.pool.add_reader(self.slot)?;
        trace!("Buffer {} now has {readers} readers", self.slot.index);

        Ok(Self {
            pool: self.pool.clone(),
            slot: self.slot,
            content: Arc::clone(&self.content),
            live: true,
        })
    }

    /// Gives this handle's reference back to the pool.
    pub fn release(mut self) -> Result<Release, PoolError> {
        self.live = false;
        self.pool.release(self.slot)
    }
}

impl<T: BufferElement> Drop for Buffer<T> {
    fn drop(&mut self) {
        if self.live {
            self.live = false;
            if let Err(e) = self.pool.release(self.slot) {
                log::error!("{e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_after_last_release() -> anyhow::Result<()> {
        let pool = BufferPool::default();
        let buffer = pool.allocate::<u8>(6, CaptionTime::default())?;

        const READERS: usize = 3;
        let readers = (0..READERS)
            .map(|_| buffer.add_reader())
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(buffer.readers(), READERS + 1);

        for (released, reader) in readers.into_iter().enumerate() {
            assert_eq!(pool.allocated(), 1);
            assert_eq!(reader.release()?, Release::Retained(READERS - released));
        }

        assert_eq!(pool.allocated(), 1);
        assert_eq!(buffer.release()?, Release::Freed);
        assert_eq!(pool.allocated(), 0);
        Ok(())
    }

    #[test]
    fn exhaustion_is_an_error() -> anyhow::Result<()> {
        let pool = BufferPool::new(2);
        let _a = pool.allocate::<u8>(3, CaptionTime::default())?;
        let _b = pool.allocate::<u8>(3, CaptionTime::default())?;

        let err = pool.allocate::<u8>(3, CaptionTime::default()).unwrap_err();
        assert!(matches!(err, PoolError::Exhausted(2)));

        drop(_a);
        assert_eq!(pool.allocated(), 1);
        assert!(pool.allocate::<u8>(3, CaptionTime::default()).is_ok());
        Ok(())
    }

    #[test]
    fn capacity_is_fixed() -> anyhow::Result<()> {
        let pool = BufferPool::default();

        let err = pool.allocate::<u8>(0, CaptionTime::default()).unwrap_err();
        assert!(matches!(err, PoolError::ZeroCapacity(DataType::CcData)));

        let mut buffer = pool.allocate::<u8>(3, CaptionTime::default())?;
        buffer.extend_from_slice(&[0xFC, 0x94, 0x2C])?;
        assert_eq!(buffer.len(), buffer.max_elements());

        let err = buffer.push(0x00).unwrap_err();
        assert!(matches!(err, PoolError::CapacityExceeded { max: 3, .. }));
        Ok(())
    }

    #[test]
    fn leftover_readers_are_reported() -> anyhow::Result<()> {
        let pool = BufferPool::default();
        assert!(pool.check_drained(Level::Warn));

        let buffer = pool.allocate::<u8>(3, CaptionTime::default())?;
        let reader = buffer.add_reader()?;
        buffer.release()?;
        assert!(!pool.check_drained(Level::Warn));

        drop(reader);
        assert!(pool.check_drained(Level::Warn));
        Ok(())
    }

    #[test]
    fn readers_cannot_write() -> anyhow::Result<()> {
        let pool = BufferPool::default();
        let mut buffer = pool.allocate::<u8>(4, CaptionTime::default())?;
        buffer.push(0x01)?;

        let reader = buffer.add_reader()?;
        assert!(matches!(buffer.push(0x02), Err(PoolError::SharedWrite(_))));
        assert_eq!(reader.elements(), &[0x01]);

        drop(reader);
        assert_eq!(buffer.readers(), 1);
        Ok(())
    }
}

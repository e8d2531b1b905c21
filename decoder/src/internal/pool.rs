use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

pub const SMALL_BUFFER_SIZE: usize = 4 * 1024;
pub const MEDIUM_BUFFER_SIZE: usize = 64 * 1024;
pub const LARGE_BUFFER_SIZE: usize = 1024 * 1024;
pub const XLARGE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Window of a released buffer that may still hold header secrets.
const HEADER_CLEAR_SIZE: usize = 64;

static GLOBAL_BUFFER_POOL: OnceLock<BufferPool> = OnceLock::new();
static GLOBAL_BOX_POOL: OnceLock<BoxPool> = OnceLock::new();

/// Sized buffer pool bounding allocation on the hot read/copy paths.
///
/// Buffers come in four fixed classes; larger requests round up to the next
/// power of two. Released buffers up to 4 KiB are fully zeroed (they may
/// carry header key material); larger ones only zero the leading header
/// window unless secure mode is on.
pub struct BufferPool {
    shelves: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    secure: AtomicBool,
}

impl BufferPool {
    pub fn global() -> &'static BufferPool {
        GLOBAL_BUFFER_POOL.get_or_init(BufferPool::new)
    }

    fn new() -> Self {
        Self {
            shelves: Mutex::new(HashMap::new()),
            secure: AtomicBool::new(false),
        }
    }

    /// When on, every released buffer is zeroed in full regardless of size.
    pub fn set_secure_mode(&self, on: bool) {
        self.secure.store(on, Ordering::Relaxed);
    }

    pub fn get(&'static self, size: usize) -> PooledBuf {
        let class = class_for(size);
        let mut storage = {
            let mut shelves = self.shelves.lock().unwrap();
            shelves
                .get_mut(&class)
                .and_then(|shelf| shelf.pop())
                .unwrap_or_else(|| vec![0u8; class])
        };
        if storage.len() != class {
            storage = vec![0u8; class];
        }
        PooledBuf {
            storage: Some(storage),
            len: size,
            pool: self,
        }
    }

    fn release(&self, mut storage: Vec<u8>) {
        let class = storage.len();
        if class_for(class) != class {
            // odd capacity, let the allocator take it back
            return;
        }
        if self.secure.load(Ordering::Relaxed) || class <= SMALL_BUFFER_SIZE {
            storage.fill(0);
        } else {
            let clear = HEADER_CLEAR_SIZE.min(storage.len());
            storage[..clear].fill(0);
        }
        let mut shelves = self.shelves.lock().unwrap();
        shelves.entry(class).or_default().push(storage);
    }

    /// Number of buffers currently resting on the shelves.
    pub fn idle_buffers(&self) -> usize {
        let shelves = self.shelves.lock().unwrap();
        shelves.values().map(Vec::len).sum()
    }
}

fn class_for(size: usize) -> usize {
    if size <= SMALL_BUFFER_SIZE {
        SMALL_BUFFER_SIZE
    } else if size <= MEDIUM_BUFFER_SIZE {
        MEDIUM_BUFFER_SIZE
    } else if size <= LARGE_BUFFER_SIZE {
        LARGE_BUFFER_SIZE
    } else if size <= XLARGE_BUFFER_SIZE {
        XLARGE_BUFFER_SIZE
    } else {
        size.next_power_of_two()
    }
}

/// RAII handle to a pooled buffer, released unconditionally on drop.
pub struct PooledBuf {
    storage: Option<Vec<u8>>,
    len: usize,
    pool: &'static BufferPool,
}

impl Deref for PooledBuf {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.storage.as_ref().unwrap()[..self.len]
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage.as_mut().unwrap()[..self.len]
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.take() {
            self.pool.release(storage);
        }
    }
}

/// Pool of cipher state boxes keyed by box length.
///
/// The segmented RC4 cipher copies its S-box once per segment; drawing the
/// copy from here keeps the per-segment allocation off the decrypt path.
/// The lock is held only to acquire or release, never during cipher work.
pub struct BoxPool {
    shelves: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
}

impl BoxPool {
    pub fn global() -> &'static BoxPool {
        GLOBAL_BOX_POOL.get_or_init(|| BoxPool {
            shelves: Mutex::new(HashMap::new()),
        })
    }

    /// Acquire a box initialized to a copy of `template`.
    pub fn acquire(&'static self, template: &[u8]) -> PooledBox {
        let mut data = {
            let mut shelves = self.shelves.lock().unwrap();
            shelves
                .get_mut(&template.len())
                .and_then(|shelf| shelf.pop())
                .unwrap_or_else(|| vec![0u8; template.len()])
        };
        data.copy_from_slice(template);
        PooledBox {
            data: Some(data),
            pool: self,
        }
    }

    fn release(&self, data: Vec<u8>) {
        let mut shelves = self.shelves.lock().unwrap();
        shelves.entry(data.len()).or_default().push(data);
    }

    pub fn idle_boxes(&self) -> usize {
        let shelves = self.shelves.lock().unwrap();
        shelves.values().map(Vec::len).sum()
    }
}

pub struct PooledBox {
    data: Option<Vec<u8>>,
    pool: &'static BoxPool,
}

impl Deref for PooledBox {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.data.as_ref().unwrap()
    }
}

impl DerefMut for PooledBox {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.as_mut().unwrap()
    }
}

impl Drop for PooledBox {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.release(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_rounding() {
        assert_eq!(class_for(1), SMALL_BUFFER_SIZE);
        assert_eq!(class_for(256), SMALL_BUFFER_SIZE);
        assert_eq!(class_for(SMALL_BUFFER_SIZE + 1), MEDIUM_BUFFER_SIZE);
        assert_eq!(class_for(LARGE_BUFFER_SIZE), LARGE_BUFFER_SIZE);
        assert_eq!(class_for(XLARGE_BUFFER_SIZE + 1), 8 * 1024 * 1024);
    }

    #[test]
    fn test_buffer_returns_on_drop() {
        let pool = BufferPool::global();
        let before = pool.idle_buffers();
        {
            let mut buf = pool.get(256);
            assert_eq!(buf.len(), 256);
            buf[0] = 0xAA;
        }
        assert!(pool.idle_buffers() > before || before > 0);
        // a small-class buffer must come back zeroed
        let buf = pool.get(256);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_box_pool_roundtrip() {
        let pool = BoxPool::global();
        let template = [7u8; 33];
        {
            let mut b = pool.acquire(&template);
            assert_eq!(&b[..], &template[..]);
            b[0] = 1;
        }
        // reacquired box is re-seeded from the template
        let b = pool.acquire(&template);
        assert_eq!(b[0], 7);
    }
}

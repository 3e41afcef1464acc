use std::sync::Arc;

use parking_lot::Mutex;

/// Default number of idle buffers a pool keeps around.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Shared pool of reusable byte buffers for frames and packets.
///
/// Cloning yields another handle to the same pool, so several stream
/// instances on different threads can obtain from it concurrently.
/// Buffers handed out are always empty; their capacity is kept so a
/// steady stream settles into zero allocations.
#[derive(Debug, Clone)]
pub struct BufferPool {
    idle: Arc<Mutex<Vec<Vec<u8>>>>,
    max_idle: usize,
}

impl BufferPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Arc::new(Mutex::new(Vec::with_capacity(max_idle))),
            max_idle,
        }
    }

    /// Take an empty buffer, reusing idle storage when available.
    pub fn obtain(&self) -> Vec<u8> {
        match self.idle.lock().pop() {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => Vec::new(),
        }
    }

    /// Return a buffer for reuse. Dropped when the pool is already full.
    pub fn recycle(&self, buf: Vec<u8>) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    /// Number of buffers currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn obtain_from_empty_pool_allocates() {
        let pool = BufferPool::new(4);
        assert!(pool.obtain().is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn recycled_buffer_comes_back_cleared() {
        let pool = BufferPool::new(4);
        let mut buf = Vec::with_capacity(2048);
        buf.extend_from_slice(&[1, 2, 3]);
        pool.recycle(buf);
        assert_eq!(pool.idle(), 1);

        let reused = pool.obtain();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= 2048);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = BufferPool::new(2);
        for _ in 0..5 {
            pool.recycle(vec![0u8; 16]);
        }
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn clones_share_storage() {
        let pool = BufferPool::new(4);
        let other = pool.clone();
        other.recycle(vec![9]);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn concurrent_obtain_and_recycle() {
        let pool = BufferPool::new(8);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for i in 0..100u8 {
                        let mut buf = pool.obtain();
                        assert!(buf.is_empty());
                        buf.push(i);
                        pool.recycle(buf);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.idle() <= 8);
    }
}

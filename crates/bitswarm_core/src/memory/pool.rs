//! # Object Pools
//!
//! Recycling pools for objects that are built, used once, and thrown away
//! many times per tick (frame writers, decode scratch).

use crate::bits::BitWriter;

/// Objects that can be returned to a pool in a reusable state.
pub trait Recycle {
    /// Clears the object for its next use, keeping its allocations.
    fn recycle(&mut self);
}

impl Recycle for BitWriter {
    #[inline]
    fn recycle(&mut self) {
        self.reset();
    }
}

impl<T> Recycle for Vec<T> {
    #[inline]
    fn recycle(&mut self) {
        self.clear();
    }
}

/// A free-list pool of recyclable objects.
///
/// `spawn` pops a recycled object or builds a fresh one with the factory;
/// `despawn` recycles it and keeps it unless the free list is full.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per tick loop.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = ObjectPool::new(64, BitWriter::framed);
///
/// let mut writer = pool.spawn();
/// writer.write_bool(true);
/// pool.despawn(writer); // reset and kept for the next frame
/// ```
pub struct ObjectPool<T> {
    /// Recycled objects ready for reuse.
    free_list: Vec<T>,
    /// Maximum number of idle objects retained.
    capacity: usize,
    /// Builds an object when the free list is empty.
    factory: fn() -> T,
    /// Objects built by the factory.
    created: usize,
    /// Spawns served from the free list.
    reused: usize,
}

impl<T: Recycle> ObjectPool<T> {
    /// Creates a pool retaining at most `capacity` idle objects.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum idle objects kept
    /// * `factory` - Builds a fresh object on a miss
    #[must_use]
    pub fn new(capacity: usize, factory: fn() -> T) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            free_list: Vec::with_capacity(capacity),
            capacity,
            factory,
            created: 0,
            reused: 0,
        }
    }

    /// Returns the maximum number of idle objects.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of idle objects.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns how many objects the factory has built.
    #[inline]
    #[must_use]
    pub const fn created_count(&self) -> usize {
        self.created
    }

    /// Returns how many spawns were served from the free list.
    #[inline]
    #[must_use]
    pub const fn reused_count(&self) -> usize {
        self.reused
    }

    /// Takes an object from the pool, building one if none are idle.
    pub fn spawn(&mut self) -> T {
        if let Some(item) = self.free_list.pop() {
            self.reused += 1;
            return item;
        }
        self.created += 1;
        (self.factory)()
    }

    /// Recycles an object back into the pool.
    ///
    /// The object is dropped if the pool already holds `capacity` idle objects.
    pub fn despawn(&mut self, mut item: T) {
        if self.free_list.len() >= self.capacity {
            return;
        }
        item.recycle();
        self.free_list.push(item);
    }
}

/// Objects on loan for the current tick.
///
/// Everything spawned here is returned to the backing pool by
/// [`ScratchPool::drain`], called once at the end of every tick.
pub struct ScratchPool<T> {
    pool: ObjectPool<T>,
    live: Vec<T>,
}

impl<T: Recycle> ScratchPool<T> {
    /// Creates a scratch pool over a fresh [`ObjectPool`].
    #[must_use]
    pub fn new(capacity: usize, factory: fn() -> T) -> Self {
        Self {
            pool: ObjectPool::new(capacity, factory),
            live: Vec::with_capacity(capacity),
        }
    }

    /// Borrows an object for the rest of the tick.
    pub fn spawn(&mut self) -> &mut T {
        let item = self.pool.spawn();
        self.live.push(item);
        let last = self.live.len() - 1;
        &mut self.live[last]
    }

    /// Returns the number of objects on loan.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Returns the backing pool.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &ObjectPool<T> {
        &self.pool
    }

    /// Returns every loaned object to the backing pool.
    pub fn drain(&mut self) {
        for item in self.live.drain(..) {
            self.pool.despawn(item);
        }
    }
}

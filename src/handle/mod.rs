/// Generational resource handles backing all pooled renderer objects.
///
/// Slots are recycled through an intrusive free-list. Every slot carries a
/// generation counter that is bumped both when the slot is handed out and
/// when it is returned, so stale copies of a handle can never reach a
/// reused slot.
use std::array;

/// Index value reserved for the null handle.
pub const NULL_INDEX: u16 = u16::MAX;

/// Opaque reference to a pooled object: slot index plus the generation the
/// slot had when the handle was issued.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    pub idx: u16,
    pub gen: u16,
}

impl ResourceHandle {
    pub const NULL: ResourceHandle = ResourceHandle {
        idx: NULL_INDEX,
        gen: 0,
    };

    /// True for the sentinel returned when a pool is exhausted.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.idx == NULL_INDEX
    }
}

impl Default for ResourceHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// Free-list allocator for up to `N` generational handles.
pub struct HandleAllocator<const N: usize> {
    head: u16,
    next_free: [u16; N],
    generation: [u16; N],
}

impl<const N: usize> HandleAllocator<N> {
    pub fn new() -> Self {
        // The index space is u16 with NULL_INDEX reserved.
        assert!(N > 0 && N < NULL_INDEX as usize);

        let mut next_free = [NULL_INDEX; N];
        for (i, slot) in next_free.iter_mut().enumerate().take(N - 1) {
            *slot = (i + 1) as u16;
        }
        Self {
            head: 0,
            next_free,
            generation: [0; N],
        }
    }

    /// Pop a slot off the free-list and bump its generation. Returns the
    /// null handle when the pool is exhausted; callers must check.
    pub fn alloc(&mut self) -> ResourceHandle {
        if self.head == NULL_INDEX {
            return ResourceHandle::NULL;
        }
        let idx = self.head;
        self.head = self.next_free[idx as usize];
        self.generation[idx as usize] = self.generation[idx as usize].wrapping_add(1);
        ResourceHandle {
            idx,
            gen: self.generation[idx as usize],
        }
    }

    /// Return a slot to the free-list. The generation is bumped again, so
    /// every outstanding copy of `h` becomes permanently invalid.
    pub fn free(&mut self, h: ResourceHandle) {
        assert!(self.valid(h), "free(): invalid handle {h:?}");
        self.next_free[h.idx as usize] = self.head;
        self.head = h.idx;
        self.generation[h.idx as usize] = self.generation[h.idx as usize].wrapping_add(1);
    }

    /// O(1), allocation-free validity check: index in range and generation
    /// matching the slot's current generation.
    #[inline]
    pub fn valid(&self, h: ResourceHandle) -> bool {
        (h.idx as usize) < N && h.gen == self.generation[h.idx as usize]
    }
}

impl<const N: usize> Default for HandleAllocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-capacity object pool addressed by generational handles.
pub struct ResourceManager<T, const N: usize> {
    allocator: HandleAllocator<N>,
    slots: [Option<T>; N],
}

impl<T, const N: usize> ResourceManager<T, N> {
    pub fn new() -> Self {
        Self {
            allocator: HandleAllocator::new(),
            slots: array::from_fn(|_| None),
        }
    }

    /// Store `value` in a fresh slot. Returns the null handle when the pool
    /// is exhausted, dropping the value.
    pub fn emplace(&mut self, value: T) -> ResourceHandle {
        let h = self.allocator.alloc();
        if !h.is_null() {
            self.slots[h.idx as usize] = Some(value);
        }
        h
    }

    /// Drop the stored value and free the handle.
    pub fn free(&mut self, h: ResourceHandle) {
        assert!(self.allocator.valid(h), "free(): invalid handle {h:?}");
        self.slots[h.idx as usize] = None;
        self.allocator.free(h);
    }

    #[inline]
    pub fn valid(&self, h: ResourceHandle) -> bool {
        self.allocator.valid(h)
    }

    pub fn get(&self, h: ResourceHandle) -> &T {
        assert!(self.valid(h), "get(): invalid handle {h:?}");
        self.slots[h.idx as usize]
            .as_ref()
            .expect("valid handle points at an occupied slot")
    }

    pub fn get_mut(&mut self, h: ResourceHandle) -> &mut T {
        assert!(self.valid(h), "get_mut(): invalid handle {h:?}");
        self.slots[h.idx as usize]
            .as_mut()
            .expect("valid handle points at an occupied slot")
    }

    pub const fn null_handle() -> ResourceHandle {
        ResourceHandle::NULL
    }
}

impl<T, const N: usize> Default for ResourceManager<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

//! Event descriptors and the recyclable descriptor pool.
//!
//! A descriptor is the single record type threaded through both the global
//! time queue and every facility's wait queue. It lives on at most one of
//! those lists (or the free pool) at a time; `next` is the link for
//! whichever list currently owns it.

/// A pending event, or a waiting/preempted facility-queue entry.
///
/// `token` is generic over the caller's own identity type — the original
/// `smpl` accepted arbitrary hashable/comparable objects, which this crate
/// expresses as a type parameter bounded by [`Clone`] + [`Eq`].
#[derive(Debug, Clone)]
pub(crate) struct Descriptor<T> {
    pub event_code: i64,
    pub token: T,
    pub trigger_time: f64,
    pub remaining_time_to_event: f64,
    pub priority: i64,
    pub next: Option<Box<Descriptor<T>>>,
}

impl<T> Descriptor<T> {
    fn new(token: T) -> Self {
        Self {
            event_code: 0,
            token,
            trigger_time: 0.0,
            remaining_time_to_event: 0.0,
            priority: 0,
            next: None,
        }
    }
}

/// A LIFO stack of recycled descriptors.
///
/// `acquire` pops a descriptor if one is free, otherwise allocates a fresh
/// one; `release` pushes a descriptor back for reuse. There is no size
/// bound — descriptors are never dropped, only recycled, which gives stable
/// allocation behavior for the short-lived records the engine churns
/// through on every `schedule`/`cause`/`request`/`release`.
#[derive(Debug, Default)]
pub(crate) struct DescriptorPool<T> {
    head: Option<Box<Descriptor<T>>>,
}

impl<T> DescriptorPool<T> {
    pub fn new() -> Self {
        Self { head: None }
    }

    /// Clears the pool, dropping every recycled descriptor.
    pub fn clear(&mut self) {
        self.head = None;
    }

    /// Takes a descriptor from the pool, or allocates a new one carrying
    /// `token`.
    pub fn acquire(&mut self, token: T) -> Box<Descriptor<T>> {
        match self.head.take() {
            Some(mut d) => {
                self.head = d.next.take();
                d.token = token;
                d.event_code = 0;
                d.trigger_time = 0.0;
                d.remaining_time_to_event = 0.0;
                d.priority = 0;
                d
            }
            None => Box::new(Descriptor::new(token)),
        }
    }

    /// Returns a descriptor to the pool for future reuse.
    pub fn release(&mut self, mut descriptor: Box<Descriptor<T>>) {
        descriptor.next = self.head.take();
        self.head = Some(descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_without_prior_release_allocates_fresh() {
        let mut pool: DescriptorPool<&str> = DescriptorPool::new();
        let d = pool.acquire("a");
        assert_eq!(d.token, "a");
        assert_eq!(d.event_code, 0);
    }

    #[test]
    fn released_descriptors_are_reused_lifo() {
        let mut pool: DescriptorPool<&str> = DescriptorPool::new();
        let d1 = pool.acquire("a");
        let d2 = pool.acquire("b");
        pool.release(d1);
        pool.release(d2);
        // LIFO: "b" was released last, so it's the next one out.
        let reused = pool.acquire("c");
        assert_eq!(reused.token, "c");
    }

    #[test]
    fn acquire_resets_fields() {
        let mut pool: DescriptorPool<&str> = DescriptorPool::new();
        let mut d = pool.acquire("a");
        d.event_code = 7;
        d.trigger_time = 42.0;
        d.priority = 3;
        pool.release(d);
        let reused = pool.acquire("b");
        assert_eq!(reused.event_code, 0);
        assert_eq!(reused.trigger_time, 0.0);
        assert_eq!(reused.priority, 0);
    }
}

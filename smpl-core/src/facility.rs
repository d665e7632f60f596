//! Facilities: fixed pools of interchangeable servers with a priority wait
//! queue and the queue-time integration statistic.
//!
//! The harder algorithms — `request`/`preempt`/`release` — need to reach
//! into the engine's global time queue (to suspend or reschedule a token's
//! pending event), so they live on [`crate::engine::Simulation`]. This
//! module owns everything that is purely local to one facility: server
//! bookkeeping, the priority-ordered queue, and its statistics.

use crate::descriptor::Descriptor;
use crate::error::{Result, SmplError};

/// One unit of capacity within a [`Facility`].
#[derive(Debug, Clone)]
pub(crate) struct FacilityServer<T> {
    pub holder: Option<T>,
    pub holder_priority: i64,
    pub hold_start_time: f64,
    pub release_count: u64,
    pub total_busy_time: f64,
}

impl<T> FacilityServer<T> {
    fn new() -> Self {
        Self {
            holder: None,
            holder_priority: 0,
            hold_start_time: 0.0,
            release_count: 0,
            total_busy_time: 0.0,
        }
    }

    fn reset_stats(&mut self) {
        self.release_count = 0;
        self.total_busy_time = 0.0;
    }
}

/// A named resource with one or more servers and a priority wait queue.
#[derive(Debug, Clone)]
pub(crate) struct Facility<T> {
    pub name: String,
    pub servers: Vec<FacilityServer<T>>,
    pub busy_count: usize,
    queue_head: Option<Box<Descriptor<T>>>,
    pub queue_length: usize,
    pub last_change_time: f64,
    pub total_queueing_time: f64,
    pub queue_exit_count: u64,
    pub preempt_count: u64,
}

impl<T> Facility<T> {
    pub fn new(name: impl Into<String>, n_servers: usize, clock: f64) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(SmplError::InvalidArgument(
                "facility name must not be empty".to_string(),
            ));
        }
        if n_servers == 0 {
            return Err(SmplError::InvalidArgument(
                "facility must have at least one server".to_string(),
            ));
        }
        Ok(Self {
            name,
            servers: (0..n_servers).map(|_| FacilityServer::new()).collect(),
            busy_count: 0,
            queue_head: None,
            queue_length: 0,
            last_change_time: clock,
            total_queueing_time: 0.0,
            queue_exit_count: 0,
            preempt_count: 0,
        })
    }

    pub fn n_servers(&self) -> usize {
        self.servers.len()
    }

    pub fn status(&self) -> bool {
        self.busy_count >= self.servers.len()
    }

    /// Index of the first server with no holder, if any.
    pub fn free_server_index(&self) -> Option<usize> {
        self.servers.iter().position(|s| s.holder.is_none())
    }

    /// Index of the busy server with the lowest `holder_priority`; ties go
    /// to the earliest server.
    pub fn lowest_priority_holder_index(&self) -> Option<usize> {
        self.servers
            .iter()
            .enumerate()
            .filter(|(_, s)| s.holder.is_some())
            .min_by_key(|(_, s)| s.holder_priority)
            .map(|(i, _)| i)
    }

    /// Index of the server currently held by `token`, if any.
    pub fn holder_index(&self, token: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.servers.iter().position(|s| s.holder.as_ref() == Some(token))
    }

    pub fn reserve(&mut self, idx: usize, token: T, priority: i64, clock: f64) {
        let server = &mut self.servers[idx];
        server.holder = Some(token);
        server.holder_priority = priority;
        server.hold_start_time = clock;
        self.busy_count += 1;
    }

    /// Frees server `idx`, folding its hold duration into the lifetime
    /// statistics. Returns the outgoing holder.
    pub fn vacate(&mut self, idx: usize, clock: f64) -> Option<T> {
        let server = &mut self.servers[idx];
        let holder = server.holder.take();
        server.release_count += 1;
        server.total_busy_time += clock - server.hold_start_time;
        self.busy_count -= 1;
        holder
    }

    /// Rolls the queue-length integral forward to `clock`, then applies
    /// `delta` to `queue_length`. Call before every enqueue/dequeue.
    fn integrate_and_adjust(&mut self, clock: f64, delta: isize) {
        self.total_queueing_time += self.queue_length as f64 * (clock - self.last_change_time);
        self.queue_length = (self.queue_length as isize + delta) as usize;
        self.last_change_time = clock;
    }

    /// Inserts `descriptor` into the wait queue, ordered by descending
    /// priority. Among equal priorities, a preempted resumption
    /// (`remaining_time_to_event > 0`) goes in front of every existing
    /// entry at that priority, preempted or ordinary; an ordinary request
    /// goes behind them all.
    pub fn enqueue(&mut self, descriptor: Box<Descriptor<T>>, clock: f64) {
        self.integrate_and_adjust(clock, 1);

        let is_preempted = descriptor.remaining_time_to_event > 0.0;
        let priority = descriptor.priority;

        let goes_before = |next: &Descriptor<T>| -> bool {
            if next.priority != priority {
                return next.priority < priority;
            }
            is_preempted
        };

        if self.queue_head.as_deref().map_or(true, |h| goes_before(h)) {
            let mut descriptor = descriptor;
            descriptor.next = self.queue_head.take();
            self.queue_head = Some(descriptor);
            return;
        }

        let mut cursor = self.queue_head.as_mut().unwrap();
        loop {
            let stop = cursor.next.as_deref().map_or(true, |n| goes_before(n));
            if stop {
                let mut descriptor = descriptor;
                descriptor.next = cursor.next.take();
                cursor.next = Some(descriptor);
                return;
            }
            cursor = cursor.next.as_mut().unwrap();
        }
    }

    /// Removes and returns the head of the wait queue, if any.
    pub fn dequeue(&mut self, clock: f64) -> Option<Box<Descriptor<T>>> {
        let mut head = self.queue_head.take()?;
        self.queue_head = head.next.take();
        self.integrate_and_adjust(clock, -1);
        self.queue_exit_count += 1;
        Some(head)
    }

    /// Sum, across servers, of the fraction of `interval` each spent busy.
    pub fn mean_utilization(&self, interval: f64) -> f64 {
        if interval <= 0.0 {
            return 0.0;
        }
        let busy: f64 = self.servers.iter().map(|s| s.total_busy_time).sum();
        busy / interval
    }

    /// Mean busy period across all servers: total busy time over total
    /// releases, falling back to the raw busy time when nothing has
    /// released yet.
    pub fn mean_busy_period(&self) -> f64 {
        let total_busy: f64 = self.servers.iter().map(|s| s.total_busy_time).sum();
        let total_releases: u64 = self.servers.iter().map(|s| s.release_count).sum();
        if total_releases == 0 {
            total_busy
        } else {
            total_busy / total_releases as f64
        }
    }

    /// Time-weighted mean queue length over `interval`.
    pub fn mean_queue_length(&self, interval: f64) -> f64 {
        if interval <= 0.0 {
            return 0.0;
        }
        self.total_queueing_time / interval
    }

    pub fn reset_stats(&mut self) {
        for server in &mut self.servers {
            server.reset_stats();
        }
        self.total_queueing_time = 0.0;
        self.queue_exit_count = 0;
        self.preempt_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(token: &'static str, priority: i64, remaining: f64) -> Box<Descriptor<&'static str>> {
        Box::new(Descriptor {
            event_code: 1,
            token,
            trigger_time: 0.0,
            remaining_time_to_event: remaining,
            priority,
            next: None,
        })
    }

    #[test]
    fn rejects_empty_name_and_zero_servers() {
        assert!(Facility::<&str>::new("", 1, 0.0).is_err());
        assert!(Facility::<&str>::new("f", 0, 0.0).is_err());
        assert!(Facility::<&str>::new("f", 1, 0.0).is_ok());
    }

    #[test]
    fn free_server_index_finds_first_idle_server() {
        let mut f = Facility::new("f", 2, 0.0).unwrap();
        assert_eq!(f.free_server_index(), Some(0));
        f.reserve(0, "a", 1, 0.0);
        assert_eq!(f.free_server_index(), Some(1));
        f.reserve(1, "b", 1, 0.0);
        assert_eq!(f.free_server_index(), None);
    }

    #[test]
    fn lowest_priority_holder_breaks_ties_by_earliest_server() {
        let mut f = Facility::new("f", 3, 0.0).unwrap();
        f.reserve(0, "a", 5, 0.0);
        f.reserve(1, "b", 2, 0.0);
        f.reserve(2, "c", 2, 0.0);
        assert_eq!(f.lowest_priority_holder_index(), Some(1));
    }

    #[test]
    fn enqueue_orders_by_descending_priority() {
        let mut f = Facility::new("f", 1, 0.0).unwrap();
        f.enqueue(descriptor("low", 1, 0.0), 0.0);
        f.enqueue(descriptor("high", 5, 0.0), 0.0);
        f.enqueue(descriptor("mid", 3, 0.0), 0.0);
        let d1 = f.dequeue(0.0).unwrap();
        assert_eq!(d1.token, "high");
        let d2 = f.dequeue(0.0).unwrap();
        assert_eq!(d2.token, "mid");
        let d3 = f.dequeue(0.0).unwrap();
        assert_eq!(d3.token, "low");
    }

    #[test]
    fn preempted_entry_goes_ahead_of_equal_priority_ordinary_waiter() {
        let mut f = Facility::new("f", 1, 0.0).unwrap();
        f.enqueue(descriptor("ordinary", 3, 0.0), 0.0);
        f.enqueue(descriptor("resumed", 3, 2.5), 0.0);
        let d1 = f.dequeue(0.0).unwrap();
        assert_eq!(d1.token, "resumed");
        let d2 = f.dequeue(0.0).unwrap();
        assert_eq!(d2.token, "ordinary");
    }

    #[test]
    fn later_preempted_entry_also_jumps_ahead_of_an_earlier_preempted_one() {
        // A newly-preempted entry is spliced in front of every existing
        // same-priority entry, preempted or ordinary — not just ordinary
        // waiters.
        let mut f = Facility::new("f", 1, 0.0).unwrap();
        f.enqueue(descriptor("a", 5, 1.0), 0.0);
        f.enqueue(descriptor("b", 5, 2.0), 0.0);
        let d1 = f.dequeue(0.0).unwrap();
        assert_eq!(d1.token, "b");
        let d2 = f.dequeue(0.0).unwrap();
        assert_eq!(d2.token, "a");
    }

    #[test]
    fn queue_length_tracks_enqueue_and_dequeue() {
        let mut f = Facility::new("f", 1, 0.0).unwrap();
        assert_eq!(f.queue_length, 0);
        f.enqueue(descriptor("a", 1, 0.0), 1.0);
        assert_eq!(f.queue_length, 1);
        f.dequeue(2.0);
        assert_eq!(f.queue_length, 0);
        assert_eq!(f.queue_exit_count, 1);
    }

    #[test]
    fn queueing_time_integrates_staircase_area() {
        let mut f = Facility::new("f", 1, 0.0).unwrap();
        f.enqueue(descriptor("a", 1, 0.0), 0.0);
        f.enqueue(descriptor("b", 1, 0.0), 2.0);
        // between t=0 and t=2, length was 1 -> area 2.0
        assert_eq!(f.total_queueing_time, 2.0);
        f.dequeue(5.0);
        // between t=2 and t=5, length was 2 -> area += 6.0
        assert_eq!(f.total_queueing_time, 8.0);
    }
}

//! The simulation engine: virtual clock, global time queue, descriptor
//! pool, facility registry, and PRNG, wired together into the operations
//! a driver program calls in its main loop.

use std::fmt;
use std::hash::Hash;
use std::io::Write;

use tracing::debug;

use crate::descriptor::{Descriptor, DescriptorPool};
use crate::facility::Facility;
use crate::prng::Prng;
use crate::error::{Result, SmplError};
use crate::report::{self, FacilityRow};

/// Outcome of [`Simulation::request`] or [`Simulation::preempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A server was reserved immediately.
    Reserved = 0,
    /// The request was enqueued; the token will be re-dispatched with the
    /// currently-active event code once a server frees up.
    Queued = 1,
}

/// Opaque identifier for a facility registered with a [`Simulation`].
///
/// Equality matches exactly the facility it was returned for; handles from
/// one engine instance are meaningless against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FacilityHandle(usize);

/// The discrete-event simulation core.
///
/// Owns the clock, the time-ordered event queue, the recyclable descriptor
/// pool, every registered facility, and the PRNG. `T` is the caller's own
/// token type — anything that can be cloned and compared for equality and
/// hashed, mirroring the original's acceptance of arbitrary hashable
/// objects as event targets.
pub struct Simulation<T> {
    model_name: String,
    clock: f64,
    interval_start: f64,
    last_event_code: i64,
    last_token: Option<T>,
    time_queue_head: Option<Box<Descriptor<T>>>,
    pool: DescriptorPool<T>,
    facilities: Vec<Facility<T>>,
    prng: Prng,
    next_stream_index: u32,
    trace_enabled: bool,
    output_sink: Option<Box<dyn Write>>,
}

impl<T> fmt::Debug for Simulation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("model_name", &self.model_name)
            .field("clock", &self.clock)
            .field("facilities", &self.facilities.len())
            .finish()
    }
}

impl<T> Default for Simulation<T> {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            clock: 0.0,
            interval_start: 0.0,
            last_event_code: 0,
            last_token: None,
            time_queue_head: None,
            pool: DescriptorPool::new(),
            facilities: Vec::new(),
            prng: Prng::default(),
            next_stream_index: 1,
            trace_enabled: false,
            output_sink: None,
        }
    }
}

impl<T: Clone + Eq + Hash> Simulation<T> {
    /// Builds a fresh engine and immediately `init`s it with `model_name`.
    pub fn new(model_name: impl Into<String>) -> Result<Self> {
        let mut sim = Self::default();
        sim.init(model_name)?;
        Ok(sim)
    }

    /// Re-initializes the engine: clears both queues, the facility
    /// registry, and the descriptor pool; zeros the clock and interval
    /// start; advances the PRNG to the next stream in the 1..15 rotation;
    /// disables tracing; and records `model_name`.
    pub fn init(&mut self, model_name: impl Into<String>) -> Result<()> {
        let model_name = model_name.into();
        if model_name.is_empty() {
            return Err(SmplError::InvalidArgument(
                "model name must be provided".to_string(),
            ));
        }

        self.time_queue_head = None;
        self.pool.clear();
        self.facilities.clear();
        self.clock = 0.0;
        self.interval_start = 0.0;
        self.last_event_code = 0;
        self.last_token = None;
        self.trace_enabled = false;
        self.model_name = model_name;

        self.prng.stream(self.next_stream_index)?;
        self.next_stream_index = if self.next_stream_index == 15 {
            1
        } else {
            self.next_stream_index + 1
        };

        Ok(())
    }

    /// The PRNG instance belonging to this engine.
    pub fn rand(&mut self) -> &mut Prng {
        &mut self.prng
    }

    /// Zeroes all facility and server statistics and resets the interval
    /// start to the current clock. Pending events are untouched.
    ///
    /// Note: this does not touch a facility's queue-length integration
    /// baseline (`last_change_time`) — a subsequent `Lq` may be biased
    /// until the next queue transition, matching the original's behavior.
    pub fn reset(&mut self) {
        for facility in &mut self.facilities {
            facility.reset_stats();
        }
        self.interval_start = self.clock;
    }

    pub fn mname(&self) -> &str {
        &self.model_name
    }

    pub fn fname(&self, handle: FacilityHandle) -> Result<&str> {
        Ok(&self.facility(handle)?.name)
    }

    /// Enables or disables trace-line emission.
    pub fn trace(&mut self, enabled: bool) {
        self.trace_enabled = enabled;
    }

    /// Redirects trace and report output to `sink`.
    pub fn sendto(&mut self, sink: Box<dyn Write>) {
        self.output_sink = Some(sink);
    }

    /// Current simulation clock. Only [`Simulation::cause`] advances it.
    pub fn time(&self) -> f64 {
        self.clock
    }

    fn facility(&self, handle: FacilityHandle) -> Result<&Facility<T>> {
        self.facilities.get(handle.0).ok_or(SmplError::UnknownHandle)
    }

    fn facility_mut(&mut self, handle: FacilityHandle) -> Result<&mut Facility<T>> {
        self.facilities.get_mut(handle.0).ok_or(SmplError::UnknownHandle)
    }

    fn msg(&mut self, message: fmt::Arguments<'_>) {
        if !self.trace_enabled {
            return;
        }
        debug!(clock = self.clock, "{}", message);
        if let Some(sink) = self.output_sink.as_mut() {
            let _ = writeln!(sink, "At time {:12.3} -- {}", self.clock, message);
        }
    }

    // ---- facilities ----------------------------------------------------

    /// Creates a facility with `n_servers` servers (must be at least one)
    /// and registers it, returning an opaque handle.
    pub fn facility_new(&mut self, name: impl Into<String>, n_servers: usize) -> Result<FacilityHandle> {
        let facility = Facility::new(name, n_servers, self.clock)?;
        let handle = FacilityHandle(self.facilities.len());
        let name = facility.name.clone();
        self.facilities.push(facility);
        self.msg(format_args!("CREATE FACILITY {name} WITH ID {}", handle.0));
        Ok(handle)
    }

    pub fn status(&self, handle: FacilityHandle) -> Result<bool> {
        Ok(self.facility(handle)?.status())
    }

    pub fn inq(&self, handle: FacilityHandle) -> Result<usize> {
        Ok(self.facility(handle)?.queue_length)
    }

    pub fn interval(&self) -> f64 {
        self.clock - self.interval_start
    }

    pub fn u(&self, handle: FacilityHandle) -> Result<f64> {
        Ok(self.facility(handle)?.mean_utilization(self.interval()))
    }

    pub fn b(&self, handle: FacilityHandle) -> Result<f64> {
        Ok(self.facility(handle)?.mean_busy_period())
    }

    pub fn lq(&self, handle: FacilityHandle) -> Result<f64> {
        Ok(self.facility(handle)?.mean_queue_length(self.interval()))
    }

    /// Requests a server of `facility` for `token` at `priority`.
    ///
    /// Reserves a free server immediately if one exists. Otherwise enqueues
    /// the request behind any higher- or equal-priority waiters; the token
    /// is re-dispatched (with the engine's currently-active event code)
    /// once a server frees up.
    pub fn request(&mut self, handle: FacilityHandle, token: T, priority: i64) -> Result<Outcome> {
        let clock = self.clock;
        let last_event_code = self.last_event_code;
        let facility = self.facility_mut(handle)?;

        if let Some(idx) = facility.free_server_index() {
            facility.reserve(idx, token, priority, clock);
            let name = facility.name.clone();
            self.msg(format_args!("REQUEST FACILITY {name}:  RESERVED"));
            return Ok(Outcome::Reserved);
        }

        let mut descriptor = self.pool.acquire(token);
        descriptor.event_code = last_event_code;
        descriptor.remaining_time_to_event = 0.0;
        descriptor.priority = priority;

        let facility = self.facility_mut(handle)?;
        facility.enqueue(descriptor, clock);
        let name = facility.name.clone();
        let qlen = facility.queue_length;
        self.msg(format_args!("REQUEST FACILITY {name}:  QUEUED (inq = {qlen})"));
        Ok(Outcome::Queued)
    }

    /// Requests a server of `facility` for `token` at `priority`, allowed
    /// to displace the current lowest-priority holder if `priority`
    /// strictly exceeds it.
    pub fn preempt(&mut self, handle: FacilityHandle, token: T, priority: i64) -> Result<Outcome>
    where
        T: PartialEq,
    {
        let clock = self.clock;
        let facility = self.facility_mut(handle)?;

        if let Some(idx) = facility.free_server_index() {
            facility.reserve(idx, token, priority, clock);
            let name = facility.name.clone();
            self.msg(format_args!("PREEMPT FACILITY {name}:  RESERVED"));
            return Ok(Outcome::Reserved);
        }

        let lowest_idx = facility
            .lowest_priority_holder_index()
            .expect("busy facility must have at least one holder");
        let lowest_priority = facility.servers[lowest_idx].holder_priority;

        if priority <= lowest_priority {
            let last_event_code = self.last_event_code;
            let mut descriptor = self.pool.acquire(token);
            descriptor.event_code = last_event_code;
            descriptor.remaining_time_to_event = 0.0;
            descriptor.priority = priority;

            let facility = self.facility_mut(handle)?;
            facility.enqueue(descriptor, clock);
            let name = facility.name.clone();
            let qlen = facility.queue_length;
            self.msg(format_args!("PREEMPT FACILITY {name}:  QUEUED (inq = {qlen})"));
            return Ok(Outcome::Queued);
        }

        let facility_name = facility.name.clone();
        let victim_priority = facility.servers[lowest_idx].holder_priority;
        let victim_token = facility.servers[lowest_idx]
            .holder
            .clone()
            .expect("lowest-priority server must be held");

        self.msg(format_args!("PREEMPT FACILITY {facility_name}:  INTERRUPT"));

        let suspended = self.suspend(&victim_token)?;
        let mut remaining = suspended.trigger_time - clock;
        if remaining == 0.0 {
            remaining = 1.0e-99;
        }
        let event_code = suspended.event_code;
        self.pool.release(suspended);

        let mut descriptor = self.pool.acquire(victim_token);
        descriptor.event_code = event_code;
        descriptor.remaining_time_to_event = remaining;
        descriptor.priority = victim_priority;

        let facility = self.facility_mut(handle)?;
        facility.enqueue(descriptor, clock);
        let qlen = facility.queue_length;
        self.msg(format_args!("QUEUE (inq = {qlen})"));

        let facility = self.facility_mut(handle)?;
        facility.vacate(lowest_idx, clock);
        facility.preempt_count += 1;
        facility.reserve(lowest_idx, token, priority, clock);
        self.msg(format_args!("RESERVE {facility_name}:  RESERVED"));

        Ok(Outcome::Reserved)
    }

    /// Releases the server `token` holds in `facility`.
    ///
    /// If the facility's wait queue is non-empty, the head entry is
    /// dequeued: an ordinary waiter is spliced at the head of the time
    /// queue to fire immediately (before any other event at this instant);
    /// a preempted holder instead re-reserves the just-freed server and has
    /// its remaining event time rescheduled.
    pub fn release(&mut self, handle: FacilityHandle, token: &T) -> Result<()>
    where
        T: PartialEq,
    {
        let clock = self.clock;
        let facility = self.facility_mut(handle)?;
        let idx = facility.holder_index(token).ok_or_else(|| {
            SmplError::StateError("release: token holds no server in this facility".to_string())
        })?;
        facility.vacate(idx, clock);
        let facility_name = facility.name.clone();
        self.msg(format_args!("RELEASE FACILITY {facility_name}"));

        let facility = self.facility_mut(handle)?;
        let Some(mut dequeued) = facility.dequeue(clock) else {
            return Ok(());
        };
        let qlen = facility.queue_length;
        self.msg(format_args!("DEQUEUE (inq = {qlen})"));

        if dequeued.remaining_time_to_event == 0.0 {
            dequeued.trigger_time = clock;
            let event_code = dequeued.event_code;
            dequeued.next = self.time_queue_head.take();
            self.time_queue_head = Some(dequeued);
            self.msg(format_args!("RESCHEDULE EVENT {event_code}"));
        } else {
            let remaining = dequeued.remaining_time_to_event;
            let priority = dequeued.priority;
            let event_code = dequeued.event_code;
            let token = dequeued.token.clone();

            let facility = self.facility_mut(handle)?;
            facility.reserve(idx, token, priority, clock);
            self.msg(format_args!("RESERVE {facility_name}"));

            dequeued.trigger_time = clock + remaining;
            dequeued.event_code = event_code;
            self.enlist_time_queue(dequeued);
            self.msg(format_args!("RESUME EVENT {event_code}"));
        }

        Ok(())
    }

    // ---- time queue ------------------------------------------------------

    /// Schedules `token` to fire `event_code` at `clock + delay`.
    pub fn schedule(&mut self, event_code: i64, delay: f64, token: T) -> Result<()> {
        if delay < 0.0 || !delay.is_finite() {
            return Err(SmplError::InvalidArgument(
                "time to event must be a finite, non-negative number".to_string(),
            ));
        }

        let mut descriptor = self.pool.acquire(token);
        descriptor.event_code = event_code;
        descriptor.remaining_time_to_event = 0.0;
        descriptor.trigger_time = self.clock + delay;
        self.enlist_time_queue(descriptor);

        self.msg(format_args!("SCHEDULE EVENT {event_code}"));
        Ok(())
    }

    /// Dispatches the earliest pending event, advancing the clock to its
    /// trigger time. Returns `None` without mutating state if the queue is
    /// empty.
    pub fn cause(&mut self) -> Option<(i64, T)> {
        let mut head = self.time_queue_head.take()?;
        self.time_queue_head = head.next.take();

        self.last_event_code = head.event_code;
        self.last_token = Some(head.token.clone());
        self.clock = head.trigger_time;

        let result = (head.event_code, head.token.clone());
        self.pool.release(head);

        if self.trace_enabled {
            self.msg(format_args!("CAUSE EVENT {}", result.0));
        }
        Some(result)
    }

    /// Removes the first time-queue entry with the given `event_code`
    /// (earliest-first), returning its token.
    pub fn cancel(&mut self, event_code: i64) -> Option<T> {
        let removed = self.remove_time_queue_entry(|d| d.event_code == event_code)?;
        self.msg(format_args!("CANCEL EVENT {event_code}"));
        let token = removed.token.clone();
        self.pool.release(removed);
        Some(token)
    }

    /// Like [`Simulation::cancel`], but also returns the event's scheduled
    /// trigger time.
    pub fn remevent(&mut self, event_code: i64) -> Option<(T, f64)> {
        let removed = self.remove_time_queue_entry(|d| d.event_code == event_code)?;
        let result = (removed.token.clone(), removed.trigger_time);
        self.pool.release(removed);
        Some(result)
    }

    /// Removes the first time-queue entry matching both `event_code` and
    /// `token`. Returns whether one was found.
    pub fn unschedule(&mut self, event_code: i64, token: &T) -> bool
    where
        T: PartialEq,
    {
        let Some(removed) = self.remove_time_queue_entry(|d| d.event_code == event_code && &d.token == token) else {
            return false;
        };
        self.msg(format_args!("UNSCHEDULE EVENT {event_code}"));
        self.pool.release(removed);
        true
    }

    /// Removes and returns the first time-queue entry for `token`,
    /// regardless of event code. Fails if none is pending — every token
    /// holding a facility server is expected to have exactly one pending
    /// event (its eventual release or resumption).
    fn suspend(&mut self, token: &T) -> Result<Box<Descriptor<T>>>
    where
        T: PartialEq,
    {
        let removed = self
            .remove_time_queue_entry(|d| &d.token == token)
            .ok_or_else(|| SmplError::StateError("no event scheduled for token".to_string()))?;
        self.msg(format_args!("SUSPEND EVENT {}", removed.event_code));
        Ok(removed)
    }

    fn remove_time_queue_entry(
        &mut self,
        mut matches: impl FnMut(&Descriptor<T>) -> bool,
    ) -> Option<Box<Descriptor<T>>> {
        if self.time_queue_head.as_deref().is_some_and(&mut matches) {
            let mut head = self.time_queue_head.take().unwrap();
            self.time_queue_head = head.next.take();
            return Some(head);
        }

        let mut cursor = self.time_queue_head.as_mut()?;
        loop {
            if cursor.next.as_deref().is_some_and(&mut matches) {
                let mut found = cursor.next.take().unwrap();
                cursor.next = found.next.take();
                return Some(found);
            }
            cursor = cursor.next.as_mut()?;
        }
    }

    /// Strict ascending insertion by `trigger_time`; ties keep insertion
    /// order (stable FIFO).
    fn enlist_time_queue(&mut self, descriptor: Box<Descriptor<T>>) {
        let goes_before = |next: &Descriptor<T>| next.trigger_time > descriptor.trigger_time;

        if self.time_queue_head.as_deref().map_or(true, goes_before) {
            let mut descriptor = descriptor;
            descriptor.next = self.time_queue_head.take();
            self.time_queue_head = Some(descriptor);
            return;
        }

        let mut cursor = self.time_queue_head.as_mut().unwrap();
        loop {
            let stop = cursor.next.as_deref().map_or(true, goes_before);
            if stop {
                let mut descriptor = descriptor;
                descriptor.next = cursor.next.take();
                cursor.next = Some(descriptor);
                return;
            }
            cursor = cursor.next.as_mut().unwrap();
        }
    }

    // ---- reporting ---------------------------------------------------

    /// Renders the fixed-column text report and writes it to the
    /// configured sink (if any), also returning it for inspection.
    pub fn report(&mut self) -> String {
        if self.facilities.is_empty() {
            let text = "no facilities defined:  report abandoned\n".to_string();
            self.write_sink(&text);
            return text;
        }

        let interval = self.interval();
        let rows: Vec<FacilityRow> = self
            .facilities
            .iter()
            .map(|f| {
                let releases: u64 = f.servers.iter().map(|s| s.release_count).sum();
                FacilityRow {
                    display_name: report::display_name(&f.name, f.n_servers()),
                    util: f.mean_utilization(interval),
                    busy_period: f.mean_busy_period(),
                    mean_queue_length: f.mean_queue_length(interval),
                    releases,
                    preempt_count: f.preempt_count,
                    queue_exit_count: f.queue_exit_count,
                }
            })
            .collect();

        let text = report::render(&self.model_name, self.clock, interval, &rows);
        self.write_sink(&text);
        text
    }

    fn write_sink(&mut self, text: &str) {
        if let Some(sink) = self.output_sink.as_mut() {
            let _ = sink.write_all(text.as_bytes());
        }
    }
}

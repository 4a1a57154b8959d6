//! Kernel — the run loop
//!
//! Binds a [`Scheduler`] to the task tables of its classes and to the idle
//! hook. `run_next_task` is one dispatch step, `task_loop` is the device's
//! main loop.
//!
//! Author: Moroya Sakamoto

use log::{info, trace, warn};

use crate::error::{Result, SchedError};
use crate::policy::Policy;
use crate::power::Sleep;
use crate::scheduler::Scheduler;
use crate::table::Tasks;
use crate::task::{ClassId, Dispatch};

/// Run-loop counters (wrapping)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    /// Task bodies dispatched
    pub dispatches: u32,
    /// Calls into the idle hook
    pub sleeps: u32,
    /// Dispatched ids with no registered body
    pub missing_bodies: u32,
}

/// Run loop over one scheduler
pub struct Kernel<'a, P: Policy, S: Sleep> {
    sched: &'a Scheduler<P>,
    basic: Tasks<'a, P>,
    extended: Tasks<'a, P>,
    hook: S,
    stats: KernelStats,
}

impl<'a, P: Policy, S: Sleep> Kernel<'a, P, S> {
    /// Bind tables and hook to a scheduler
    ///
    /// Each table must cover the namespace and capacity of its class.
    pub fn new(
        sched: &'a Scheduler<P>,
        basic: Tasks<'a, P>,
        extended: Tasks<'a, P>,
        hook: S,
    ) -> Result<Self> {
        check_table(sched, ClassId::Basic, &basic)?;
        check_table(sched, ClassId::Extended, &extended)?;
        info!(
            "kernel: policy={} basic={} extended={}",
            P::NAME,
            basic.namespace,
            extended.namespace
        );
        Ok(Self {
            sched,
            basic,
            extended,
            hook,
            stats: KernelStats::default(),
        })
    }

    /// Kernel for a policy without extended tasks
    pub fn basic_only(sched: &'a Scheduler<P>, basic: Tasks<'a, P>, hook: S) -> Result<Self> {
        let extended = Tasks::empty(sched.namespace(ClassId::Extended));
        Self::new(sched, basic, extended, hook)
    }

    /// One dispatch step
    ///
    /// Runs the next task and returns true. With an empty scheduler:
    /// returns false at once if `sleep_if_empty` is false, otherwise sleeps
    /// through the idle hook until a task shows up (never returns false).
    pub fn run_next_task(&mut self, sleep_if_empty: bool) -> bool {
        loop {
            let sched = self.sched;
            let hook = &mut self.hook;
            let sleeps = &mut self.stats.sleeps;

            let next = critical_section::with(|cs| {
                if let Some(dispatch) = sched.begin_dispatch(cs) {
                    return Some(dispatch);
                }
                if sleep_if_empty {
                    *sleeps = sleeps.wrapping_add(1);
                    trace!("idle: sleep");
                    hook.try_sleep();
                }
                None
            });

            match next {
                Some(dispatch) => {
                    self.run(dispatch);
                    return true;
                }
                None if !sleep_if_empty => return false,
                None => {}
            }
        }
    }

    /// Main loop, never returns
    pub fn task_loop(&mut self) -> ! {
        info!("kernel: entering task loop");
        loop {
            self.run_next_task(true);
        }
    }

    /// Dispatch until every queue is empty, without sleeping
    ///
    /// Returns the number of tasks run. Does not terminate if a task keeps
    /// re-posting itself.
    pub fn run_until_idle(&mut self) -> u32 {
        let mut ran = 0u32;
        while self.run_next_task(false) {
            ran = ran.wrapping_add(1);
        }
        ran
    }

    /// Dispatch at most `n` tasks without sleeping
    pub fn run_for(&mut self, n: u32) -> u32 {
        let mut ran = 0u32;
        while ran < n && self.run_next_task(false) {
            ran += 1;
        }
        ran
    }

    fn run(&mut self, dispatch: Dispatch) {
        let table = match dispatch.class {
            ClassId::Basic => self.basic,
            ClassId::Extended => self.extended,
        };

        match table.get(dispatch.id) {
            Some(entry) => {
                trace!("run {} {} ({})", dispatch.class, dispatch.id, entry.name());
                (entry.body)(self.sched, dispatch);
            }
            None => {
                warn!("run {} {}: no body registered", dispatch.class, dispatch.id);
                self.stats.missing_bodies = self.stats.missing_bodies.wrapping_add(1);
            }
        }

        self.sched.complete(dispatch);
        self.stats.dispatches = self.stats.dispatches.wrapping_add(1);
    }

    pub fn scheduler(&self) -> &'a Scheduler<P> {
        self.sched
    }

    pub fn hook(&self) -> &S {
        &self.hook
    }

    pub fn stats(&self) -> KernelStats {
        self.stats
    }

    /// Memory footprint estimate of the run loop itself
    pub fn memory_footprint(&self) -> usize {
        core::mem::size_of::<Self>()
    }
}

fn check_table<P: Policy>(sched: &Scheduler<P>, class: ClassId, tasks: &Tasks<'_, P>) -> Result<()> {
    let expected = sched.namespace(class);
    if tasks.namespace != expected {
        return Err(SchedError::NamespaceMismatch {
            class,
            expected: expected.name(),
            found: tasks.namespace.name(),
        });
    }
    let capacity = sched.capacity(class);
    if tasks.capacity() != capacity {
        return Err(SchedError::CapacityMismatch {
            class,
            table: tasks.capacity(),
            capacity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{BASIC, EDF, HIGH_PRIORITY};
    use crate::policy::{EdfPolicy, Fairness, Fifo, PriorityPolicy};
    use crate::power::WaitForInterrupt;
    use crate::table::TaskTable;
    use crate::task::{Deadline, PostResult, TaskId, TaskState};
    use core::cell::{Cell, RefCell};

    const A: TaskId = TaskId::new(0);
    const B: TaskId = TaskId::new(1);
    const C: TaskId = TaskId::new(2);
    const D: TaskId = TaskId::new(3);

    std::thread_local! {
        static RAN: RefCell<Vec<(ClassId, u8)>> = const { RefCell::new(Vec::new()) };
        static REPOSTS: Cell<u32> = const { Cell::new(0) };
    }

    fn record(dispatch: Dispatch) {
        RAN.with(|ran| ran.borrow_mut().push((dispatch.class, dispatch.id.get())));
    }

    fn ran() -> Vec<(ClassId, u8)> {
        RAN.with(|ran| ran.borrow().clone())
    }

    fn ran_ids() -> Vec<u8> {
        ran().into_iter().map(|(_, id)| id).collect()
    }

    // Plain FIFO

    type Basic4 = Fifo<4>;

    fn note(_: &Scheduler<Basic4>, dispatch: Dispatch) {
        record(dispatch);
    }

    /// Re-posts itself until it has run three times
    fn repost_thrice(sched: &Scheduler<Basic4>, dispatch: Dispatch) {
        record(dispatch);
        assert_eq!(
            sched.task_state(ClassId::Basic, dispatch.id),
            Some(TaskState::Running)
        );
        let n = REPOSTS.with(|c| {
            c.set(c.get() + 1);
            c.get()
        });
        if n < 3 {
            assert_eq!(sched.post_task(dispatch.id), Ok(PostResult::Accepted));
        }
    }

    /// Chains into D
    fn post_d(sched: &Scheduler<Basic4>, dispatch: Dispatch) {
        record(dispatch);
        let _ = sched.post_task(D);
    }

    static BASIC_TASKS: TaskTable<Basic4, 4> = TaskTable::new(BASIC)
        .with(A, b"a", note)
        .with(B, b"b", note)
        .with(C, b"c", post_d)
        .with(D, b"d", note);

    static REPOST_TASKS: TaskTable<Basic4, 4> = TaskTable::new(BASIC)
        .with(A, b"again", repost_thrice)
        .with(B, b"b", note);

    fn fifo_kernel<'a, S: Sleep>(
        sched: &'a Scheduler<Basic4>,
        table: &'a TaskTable<Basic4, 4>,
        hook: S,
    ) -> Kernel<'a, Basic4, S> {
        sched.init();
        Kernel::basic_only(sched, table.view(), hook).unwrap()
    }

    #[test]
    fn test_scenario() {
        let sched = Scheduler::new(Basic4::new());
        let mut kernel = fifo_kernel(&sched, &BASIC_TASKS, WaitForInterrupt);

        assert_eq!(sched.post_task(A), Ok(PostResult::Accepted));
        assert_eq!(sched.post_task(B), Ok(PostResult::Accepted));
        assert_eq!(sched.post_task(A), Ok(PostResult::AlreadyPending));
        assert!(kernel.run_next_task(false));
        assert!(kernel.run_next_task(false));
        assert!(!kernel.run_next_task(false));
        assert_eq!(sched.post_task(A), Ok(PostResult::Accepted));

        assert_eq!(ran_ids(), [0, 1]);
        assert_eq!(kernel.stats().dispatches, 2);
        assert_eq!(kernel.stats().sleeps, 0);
    }

    #[test]
    fn test_poll_empty_does_nothing() {
        let sched = Scheduler::new(Basic4::new());
        let mut kernel = fifo_kernel(&sched, &BASIC_TASKS, WaitForInterrupt);
        assert!(!kernel.run_next_task(false));
        assert!(ran().is_empty());
        assert_eq!(kernel.stats(), KernelStats::default());
    }

    #[test]
    fn test_chained_post_runs_last() {
        let sched = Scheduler::new(Basic4::new());
        let mut kernel = fifo_kernel(&sched, &BASIC_TASKS, WaitForInterrupt);
        let _ = sched.post_task(C);
        let _ = sched.post_task(A);
        assert_eq!(kernel.run_until_idle(), 3);
        assert_eq!(ran_ids(), [2, 0, 3]);
    }

    #[test]
    fn test_self_repost_goes_to_tail() {
        let sched = Scheduler::new(Basic4::new());
        let mut kernel = fifo_kernel(&sched, &REPOST_TASKS, WaitForInterrupt);
        let _ = sched.post_task(A);
        let _ = sched.post_task(B);
        assert_eq!(kernel.run_until_idle(), 4);
        assert_eq!(ran_ids(), [0, 1, 0, 0]);
        assert_eq!(sched.task_state(ClassId::Basic, A), Some(TaskState::Idle));
    }

    #[test]
    fn test_missing_body() {
        let sched = Scheduler::new(Basic4::new());
        let mut kernel = fifo_kernel(&sched, &REPOST_TASKS, WaitForInterrupt);
        let _ = sched.post_task(D);
        assert!(kernel.run_next_task(false));
        assert_eq!(kernel.stats().missing_bodies, 1);
        assert_eq!(sched.task_state(ClassId::Basic, D), Some(TaskState::Idle));
    }

    /// Idle hook standing in for an interrupt that posts on its n-th wake
    struct Irq<'a> {
        sched: &'a Scheduler<Basic4>,
        sleeps: u32,
        fire_at: u32,
        id: TaskId,
    }

    impl Sleep for Irq<'_> {
        fn try_sleep(&mut self) {
            assert!(self.sched.is_idle(), "slept with work pending");
            self.sleeps += 1;
            if self.sleeps == self.fire_at {
                let _ = self.sched.post_task(self.id);
            }
        }
    }

    #[test]
    fn test_blocking_dispatch() {
        let sched = Scheduler::new(Basic4::new());
        let irq = Irq {
            sched: &sched,
            sleeps: 0,
            fire_at: 3,
            id: B,
        };
        let mut kernel = fifo_kernel(&sched, &BASIC_TASKS, irq);

        assert!(kernel.run_next_task(true));
        // Two spurious wakes, then the posting one
        assert_eq!(kernel.hook().sleeps, 3);
        assert_eq!(kernel.stats().sleeps, 3);
        assert_eq!(ran_ids(), [1]);
        assert!(sched.is_idle());
    }

    #[test]
    fn test_no_sleep_with_work_pending() {
        let sched = Scheduler::new(Basic4::new());
        let irq = Irq {
            sched: &sched,
            sleeps: 0,
            fire_at: 1,
            id: A,
        };
        let mut kernel = fifo_kernel(&sched, &BASIC_TASKS, irq);
        let _ = sched.post_task(A);
        assert!(kernel.run_next_task(true));
        assert_eq!(kernel.stats().sleeps, 0);
    }

    #[test]
    fn test_table_validation() {
        static WRONG_NS: TaskTable<Basic4, 4> = TaskTable::new(HIGH_PRIORITY);
        static WRONG_SIZE: TaskTable<Basic4, 2> = TaskTable::new(BASIC);

        let sched = Scheduler::new(Basic4::new());
        sched.init();
        assert!(matches!(
            Kernel::basic_only(&sched, WRONG_NS.view(), WaitForInterrupt),
            Err(SchedError::NamespaceMismatch {
                class: ClassId::Basic,
                ..
            })
        ));
        assert!(matches!(
            Kernel::basic_only(&sched, WRONG_SIZE.view(), WaitForInterrupt),
            Err(SchedError::CapacityMismatch {
                table: 2,
                capacity: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_posts_from_interrupt_thread() {
        use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

        static SCHED: Scheduler<Basic4> = Scheduler::new(Basic4::new());
        static ACCEPTED: AtomicU32 = AtomicU32::new(0);
        static DONE: AtomicBool = AtomicBool::new(false);

        let mut kernel = fifo_kernel(&SCHED, &BASIC_TASKS, WaitForInterrupt);

        let isr = std::thread::spawn(|| {
            for round in 0..2000u32 {
                let id = TaskId::new((round % 2) as u8);
                if SCHED.post_task(id) == Ok(PostResult::Accepted) {
                    ACCEPTED.fetch_add(1, Ordering::Relaxed);
                }
            }
            DONE.store(true, Ordering::Release);
        });

        loop {
            let finished = DONE.load(Ordering::Acquire);
            kernel.run_until_idle();
            if finished && SCHED.is_idle() {
                break;
            }
        }
        isr.join().unwrap();

        assert_eq!(kernel.stats().dispatches, ACCEPTED.load(Ordering::Relaxed));
        assert_eq!(ran().len() as u32, ACCEPTED.load(Ordering::Relaxed));
    }

    // Priority and EDF

    type Prio = PriorityPolicy<2, 2>;

    fn prio_forever(sched: &Scheduler<Prio>, dispatch: Dispatch) {
        record(dispatch);
        let _ = match dispatch.class {
            ClassId::Basic => sched.post_task(dispatch.id),
            ClassId::Extended => sched.post_extended(dispatch.id, ()),
        };
    }

    static PRIO_BASIC: TaskTable<Prio, 2> = TaskTable::new(BASIC).with(A, b"bg", prio_forever);
    static PRIO_HIGH: TaskTable<Prio, 2> = TaskTable::new(HIGH_PRIORITY)
        .with(A, b"hi-a", prio_forever)
        .with(B, b"hi-b", prio_forever);

    #[test]
    fn test_basic_not_starved_by_priority() {
        let sched = Scheduler::new(Prio::priority(Fairness::DEFAULT));
        sched.init();
        let mut kernel = Kernel::new(
            &sched,
            PRIO_BASIC.view(),
            PRIO_HIGH.view(),
            WaitForInterrupt,
        )
        .unwrap();

        let _ = sched.post_task(A);
        let _ = sched.post_extended(A, ());
        let _ = sched.post_extended(B, ());
        assert_eq!(kernel.run_for(1000), 1000);

        let basic = ran().iter().filter(|(c, _)| *c == ClassId::Basic).count() as u32;
        assert!(basic >= 10, "basic class got {basic} of 1000");
        assert_eq!(sched.stats().dispatched_basic, basic);
        // High-priority ids still alternate
        let high: Vec<u8> = ran()
            .iter()
            .filter(|(c, _)| *c == ClassId::Extended)
            .map(|(_, id)| *id)
            .take(4)
            .collect();
        assert_eq!(high, [0, 1, 0, 1]);
    }

    type Edf = EdfPolicy<3, 1>;

    fn edf_note(_: &Scheduler<Edf>, dispatch: Dispatch) {
        record(dispatch);
    }

    fn edf_urgent_forever(sched: &Scheduler<Edf>, dispatch: Dispatch) {
        record(dispatch);
        let _ = sched.post_with_deadline(dispatch.id, Deadline::at(0));
    }

    static EDF_BASIC: TaskTable<Edf, 1> = TaskTable::new(BASIC).with(A, b"bg", edf_note);
    static EDF_TASKS: TaskTable<Edf, 3> = TaskTable::new(EDF)
        .with(A, b"late", edf_note)
        .with(B, b"soon", edf_note)
        .with(C, b"urgent", edf_urgent_forever);

    #[test]
    fn test_edf_dispatch_order() {
        let sched = Scheduler::new(Edf::edf(Fairness::DEFAULT));
        sched.init();
        let mut kernel =
            Kernel::new(&sched, EDF_BASIC.view(), EDF_TASKS.view(), WaitForInterrupt).unwrap();

        let _ = sched.post_task(A);
        let _ = sched.post_with_deadline(A, Deadline::after(100, 50));
        let _ = sched.post_with_deadline(B, Deadline::after(100, 5));
        assert_eq!(kernel.run_until_idle(), 3);
        assert_eq!(
            ran(),
            [
                (ClassId::Extended, 1),
                (ClassId::Extended, 0),
                (ClassId::Basic, 0)
            ]
        );
    }

    #[test]
    fn test_basic_not_starved_by_edf() {
        let sched = Scheduler::new(Edf::edf(Fairness::from_share_percent(10)));
        sched.init();
        let mut kernel =
            Kernel::new(&sched, EDF_BASIC.view(), EDF_TASKS.view(), WaitForInterrupt).unwrap();

        let _ = sched.post_with_deadline(C, Deadline::at(0));
        let _ = sched.post_task(A);
        kernel.run_for(10);
        assert_eq!(ran().iter().filter(|(c, _)| *c == ClassId::Basic).count(), 1);
    }

    #[test]
    fn test_memory_footprint() {
        let sched = Scheduler::new(Basic4::new());
        let kernel = fifo_kernel(&sched, &BASIC_TASKS, WaitForInterrupt);
        assert!(kernel.memory_footprint() < 256);
        assert!(core::mem::size_of::<Scheduler<Fifo<16>>>() < 256);
    }
}

//! Post/dispatch core
//!
//! All mutable scheduler state (pending registries, class queues, fairness
//! counters, statistics) sits behind one `critical_section::Mutex`. That
//! critical section is the only synchronization boundary: posts from
//! interrupt handlers and dispatch steps from the run loop each take it
//! once, for the mark-and-enqueue or dequeue-and-clear pair.
//!
//! Task bodies never run inside it.
//!
//! Author: Moroya Sakamoto

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use log::{debug, error, info, trace, warn};

use crate::class::{to_result, DeadlineClass, Enqueue, Namespace, SchedClass};
use crate::error::{Result, SchedError};
use crate::policy::Policy;
use crate::task::{ClassId, Deadline, Dispatch, PostResult, TaskId, TaskState};

/// Post/dispatch counters (wrapping)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Posts that queued a task
    pub accepted: u32,
    /// Posts answered with `AlreadyPending`
    pub rejected: u32,
    /// Dispatches from the basic class
    pub dispatched_basic: u32,
    /// Dispatches from the extended class
    pub dispatched_extended: u32,
}

impl SchedStats {
    pub fn dispatched(&self) -> u32 {
        self.dispatched_basic.wrapping_add(self.dispatched_extended)
    }

    const fn zero() -> Self {
        Self {
            accepted: 0,
            rejected: 0,
            dispatched_basic: 0,
            dispatched_extended: 0,
        }
    }
}

struct State<P> {
    policy: P,
    stats: SchedStats,
}

/// Cooperative task scheduler
///
/// `const`-constructible and `Sync`, so it can live in a `static` shared
/// by interrupt handlers and the main loop.
pub struct Scheduler<P: Policy> {
    state: Mutex<RefCell<State<P>>>,
}

impl<P: Policy> Scheduler<P> {
    /// Create a scheduler with the given policy
    pub const fn new(policy: P) -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                policy,
                stats: SchedStats::zero(),
            })),
        }
    }

    /// Reset every registry, queue and counter
    ///
    /// Call once before the first post or dispatch.
    pub fn init(&self) {
        let (basic, extended) = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.policy.reset();
            state.stats = SchedStats::default();
            (
                state.policy.basic().capacity(),
                state.policy.extended().capacity(),
            )
        });
        info!(
            "scheduler init: policy={} basic={} extended={}",
            P::NAME,
            basic,
            extended
        );
    }

    /// Post a basic task
    pub fn post_task(&self, id: TaskId) -> Result<PostResult> {
        self.post_with(ClassId::Basic, id, |policy| {
            let capacity = policy.basic().capacity();
            (capacity, policy.basic_mut().post(id, ()))
        })
    }

    /// Post a task of the extended class with its class parameter
    pub fn post_extended(
        &self,
        id: TaskId,
        params: <P::Extended as SchedClass>::Params,
    ) -> Result<PostResult> {
        self.post_with(ClassId::Extended, id, |policy| {
            let capacity = policy.extended().capacity();
            (capacity, policy.extended_mut().post(id, params))
        })
    }

    fn post_with<F>(&self, class: ClassId, id: TaskId, post: F) -> Result<PostResult>
    where
        F: FnOnce(&mut P) -> (usize, Enqueue),
    {
        let (capacity, outcome) = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let (capacity, outcome) = post(&mut state.policy);
            if let Enqueue::Posted(result) = outcome {
                let stats = &mut state.stats;
                match result {
                    PostResult::Accepted => stats.accepted = stats.accepted.wrapping_add(1),
                    PostResult::AlreadyPending => stats.rejected = stats.rejected.wrapping_add(1),
                }
            }
            (capacity, outcome)
        });

        let result = to_result(class, id, capacity, outcome);
        match &result {
            Ok(PostResult::Accepted) => debug!("post {} {}: accepted", class, id),
            Ok(PostResult::AlreadyPending) => debug!("post {} {}: already pending", class, id),
            Err(err @ SchedError::QueueFull { .. }) => error!("post {} {}: {}", class, id, err),
            Err(err) => warn!("post {} {}: {}", class, id, err),
        }
        result
    }

    /// Dequeue the next task and clear its pending flag
    ///
    /// The task is `Running` on return; pair with [`complete`](Self::complete)
    /// once its body returned.
    pub fn begin_dispatch(&self, cs: CriticalSection<'_>) -> Option<Dispatch> {
        let mut state = self.state.borrow_ref_mut(cs);
        let class = state.policy.select()?;
        let queued = match class {
            ClassId::Basic => state.policy.basic_mut().pop(),
            ClassId::Extended => state.policy.extended_mut().pop(),
        }?;
        let stats = &mut state.stats;
        match class {
            ClassId::Basic => stats.dispatched_basic = stats.dispatched_basic.wrapping_add(1),
            ClassId::Extended => {
                stats.dispatched_extended = stats.dispatched_extended.wrapping_add(1)
            }
        }
        trace!("dispatch {} {}", class, queued.id);
        Some(Dispatch {
            class,
            id: queued.id,
            deadline: queued.deadline,
        })
    }

    /// Non-blocking dequeue in its own critical section
    pub fn try_dispatch(&self) -> Option<Dispatch> {
        critical_section::with(|cs| self.begin_dispatch(cs))
    }

    /// Body of a dispatched task returned
    ///
    /// Running → Idle, or stays Pending if the body re-posted it.
    pub fn complete(&self, dispatch: Dispatch) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            match dispatch.class {
                ClassId::Basic => state.policy.basic_mut().finish(dispatch.id),
                ClassId::Extended => state.policy.extended_mut().finish(dispatch.id),
            }
        });
    }

    /// Lifecycle state of a task (None if outside the class)
    pub fn task_state(&self, class: ClassId, id: TaskId) -> Option<TaskState> {
        self.with_policy(|policy| match class {
            ClassId::Basic => policy.basic().state(id),
            ClassId::Extended => policy.extended().state(id),
        })
    }

    /// Queued tasks across all classes
    pub fn pending(&self) -> usize {
        self.with_policy(|policy| policy.basic().len() + policy.extended().len())
    }

    /// Queued tasks in one class
    pub fn pending_in(&self, class: ClassId) -> usize {
        self.with_policy(|policy| match class {
            ClassId::Basic => policy.basic().len(),
            ClassId::Extended => policy.extended().len(),
        })
    }

    /// Every queue empty
    pub fn is_idle(&self) -> bool {
        self.with_policy(|policy| policy.is_idle())
    }

    /// Same check from inside an already-held critical section
    pub fn is_idle_in(&self, cs: CriticalSection<'_>) -> bool {
        self.state.borrow_ref(cs).policy.is_idle()
    }

    /// Capacity of a class (its number of ids)
    pub fn capacity(&self, class: ClassId) -> usize {
        self.with_policy(|policy| match class {
            ClassId::Basic => policy.basic().capacity(),
            ClassId::Extended => policy.extended().capacity(),
        })
    }

    /// Namespace of a class
    pub fn namespace(&self, class: ClassId) -> Namespace {
        self.with_policy(|policy| match class {
            ClassId::Basic => policy.basic().namespace(),
            ClassId::Extended => policy.extended().namespace(),
        })
    }

    pub fn stats(&self) -> SchedStats {
        critical_section::with(|cs| self.state.borrow_ref(cs).stats)
    }

    fn with_policy<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        critical_section::with(|cs| f(&self.state.borrow_ref(cs).policy))
    }
}

impl<P: Policy<Extended = DeadlineClass<D>>, const D: usize> Scheduler<P> {
    /// Post an EDF task with its absolute deadline
    ///
    /// If the task is already pending its stored deadline is kept.
    pub fn post_with_deadline(&self, id: TaskId, deadline: Deadline) -> Result<PostResult> {
        self.post_extended(id, deadline)
    }
}

//! ALICE-Tasklet — post-and-run cooperative scheduler
//!
//! Interrupts post, the main loop runs.
//!
//! Minimal task core for tiny MCUs:
//! - Static task tables, ids fixed at build time (no heap, no allocation)
//! - At most one pending post per task; every accepted post runs exactly once
//! - Pluggable policy chosen by type: FIFO, high-priority FIFO, EDF
//! - Basic class guaranteed ≥1% of dispatches under any extended load
//! - One critical section is the only synchronization boundary
//!
//! ```ignore
//! static SCHED: Scheduler<Fifo<2>> = Scheduler::new(Fifo::new());
//! static TASKS: TaskTable<Fifo<2>, 2> = TaskTable::new(class::BASIC)
//!     .with(BLINK, b"blink", blink)
//!     .with(SAMPLE, b"sample", sample);
//!
//! SCHED.init();
//! Kernel::basic_only(&SCHED, TASKS.view(), WaitForInterrupt)?.task_loop();
//! ```
//!
//! Author: Moroya Sakamoto

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod task;
pub mod error;
pub mod registry;
pub mod queue;
pub mod class;
pub mod policy;
pub mod scheduler;
pub mod table;
pub mod power;
pub mod kernel;

mod tests_prop;

pub use task::{ClassId, Deadline, Dispatch, PostResult, TaskId, TaskState, MAX_TASK_IDS};
pub use error::SchedError;
pub use class::{DeadlineClass, FifoClass, Namespace, SchedClass};
pub use policy::{EdfPolicy, Fairness, Fifo, Policy, PriorityPolicy, Prioritized};
pub use scheduler::{SchedStats, Scheduler};
pub use table::{TaskFn, TaskTable};
pub use power::{Sleep, WaitForInterrupt};
pub use kernel::{Kernel, KernelStats};

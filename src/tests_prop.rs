#![cfg(test)]
//! Property tests for post/dispatch bookkeeping
//!
//! Random interleavings of basic posts, high-priority posts and dispatch
//! steps (some re-posting the running task) must keep:
//!   - at most one queued entry per id, never more than the class capacity
//!   - pending state ⇔ queued
//!   - one dispatch per accepted post

use proptest::prelude::*;

use crate::policy::{Fairness, PriorityPolicy};
use crate::scheduler::Scheduler;
use crate::task::{ClassId, PostResult, TaskId, TaskState};

const CAP: usize = 4;

#[derive(Debug, Clone, Copy)]
enum Op {
    Post(ClassId, u8),
    Dispatch { repost: bool },
}

fn arb_class() -> impl Strategy<Value = ClassId> {
    prop_oneof![Just(ClassId::Basic), Just(ClassId::Extended)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (arb_class(), 0u8..CAP as u8).prop_map(|(c, id)| Op::Post(c, id)),
        2 => any::<bool>().prop_map(|repost| Op::Dispatch { repost }),
    ]
}

fn post(sched: &Scheduler<PriorityPolicy<CAP, CAP>>, class: ClassId, id: TaskId) -> PostResult {
    let result = match class {
        ClassId::Basic => sched.post_task(id),
        ClassId::Extended => sched.post_extended(id, ()),
    };
    result.unwrap()
}

fn count_pending(sched: &Scheduler<PriorityPolicy<CAP, CAP>>, class: ClassId) -> usize {
    (0..CAP as u8)
        .filter(|id| sched.task_state(class, TaskId::new(*id)) == Some(TaskState::Pending))
        .count()
}

proptest! {
    #[test]
    fn bookkeeping_holds(ops in prop::collection::vec(arb_op(), 1..200)) {
        let sched = Scheduler::new(PriorityPolicy::<CAP, CAP>::priority(Fairness::new(2)));
        sched.init();
        let mut accepted = 0u32;
        let mut dispatched = 0u32;

        for op in ops {
            match op {
                Op::Post(class, id) => {
                    let id = TaskId::new(id);
                    let was_pending = sched.task_state(class, id) == Some(TaskState::Pending);
                    let result = post(&sched, class, id);
                    prop_assert_eq!(result == PostResult::AlreadyPending, was_pending);
                    if result.is_accepted() {
                        accepted += 1;
                    }
                }
                Op::Dispatch { repost } => {
                    if let Some(d) = sched.try_dispatch() {
                        dispatched += 1;
                        prop_assert_eq!(sched.task_state(d.class, d.id), Some(TaskState::Running));
                        if repost {
                            prop_assert_eq!(post(&sched, d.class, d.id), PostResult::Accepted);
                            accepted += 1;
                        }
                        sched.complete(d);
                    } else {
                        prop_assert!(sched.is_idle());
                    }
                }
            }

            for class in [ClassId::Basic, ClassId::Extended] {
                let queued = sched.pending_in(class);
                prop_assert!(queued <= CAP);
                prop_assert_eq!(queued, count_pending(&sched, class));
            }
        }

        while let Some(d) = sched.try_dispatch() {
            dispatched += 1;
            sched.complete(d);
        }
        prop_assert_eq!(accepted, dispatched);
        prop_assert_eq!(sched.stats().accepted, accepted);
    }

    #[test]
    fn basic_share_under_load(window in 100u32..2000, streak in 0u16..50) {
        let fairness = Fairness::new(streak);
        let sched = Scheduler::new(PriorityPolicy::<CAP, CAP>::priority(fairness));
        sched.init();
        let _ = sched.post_task(TaskId::new(0));
        let _ = sched.post_extended(TaskId::new(0), ());

        let mut basic = 0u32;
        for _ in 0..window {
            let d = sched.try_dispatch().unwrap();
            if d.class == ClassId::Basic {
                basic += 1;
            }
            // Both classes stay fed
            let _ = post(&sched, d.class, d.id);
            sched.complete(d);
        }
        prop_assert!(basic >= fairness.basic_floor(window));
    }
}

//! Dispatch policies — which class runs next
//!
//! Selected at build time through the `Policy` type parameter of
//! [`Scheduler`](crate::scheduler::Scheduler); no virtual dispatch.
//!
//! `Prioritized` serves its extended class first, with a bounded streak:
//! while basic work is pending, at most `max_streak` extended dispatches
//! happen in a row before one basic dispatch is forced. With the default
//! streak of 99 the basic class gets at least 1 of every 100 dispatches.
//!
//! Author: Moroya Sakamoto

use crate::class::{DeadlineClass, FifoClass, NoClass, SchedClass, BASIC, EDF, HIGH_PRIORITY};
use crate::task::ClassId;

/// Starvation bound for the basic class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fairness {
    /// Consecutive extended dispatches allowed while basic work waits
    pub max_streak: u16,
}

impl Fairness {
    /// 1% basic share
    pub const DEFAULT: Fairness = Fairness { max_streak: 99 };

    pub const fn new(max_streak: u16) -> Self {
        Self { max_streak }
    }

    /// Streak giving the basic class at least `percent`% of dispatches
    ///
    /// `percent` is clamped to 1..=100.
    pub const fn from_share_percent(percent: u8) -> Self {
        let p = if percent == 0 {
            1
        } else if percent > 100 {
            100
        } else {
            percent
        };
        Self {
            max_streak: (100 / p as u16) - 1,
        }
    }

    /// Minimum basic dispatches guaranteed in a window of `n`
    pub const fn basic_floor(&self, n: u32) -> u32 {
        n / (self.max_streak as u32 + 1)
    }
}

impl Default for Fairness {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Scheduling policy: owns the classes and picks the next one
pub trait Policy: Send {
    type Basic: SchedClass<Params = ()>;
    type Extended: SchedClass;

    /// Short name for logs
    const NAME: &'static str;

    fn basic(&self) -> &Self::Basic;
    fn basic_mut(&mut self) -> &mut Self::Basic;
    fn extended(&self) -> &Self::Extended;
    fn extended_mut(&mut self) -> &mut Self::Extended;

    /// Class to service now; None only if every queue is empty
    fn select(&mut self) -> Option<ClassId>;

    /// Clear queues and fairness bookkeeping
    fn reset(&mut self) {
        self.basic_mut().reset();
        self.extended_mut().reset();
    }

    fn is_idle(&self) -> bool {
        self.basic().is_empty() && self.extended().is_empty()
    }
}

/// Plain FIFO: the basic class only
pub struct Fifo<const B: usize> {
    basic: FifoClass<B>,
    none: NoClass,
}

impl<const B: usize> Fifo<B> {
    pub const fn new() -> Self {
        Self {
            basic: FifoClass::new(BASIC),
            none: NoClass,
        }
    }
}

impl<const B: usize> Default for Fifo<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const B: usize> Policy for Fifo<B> {
    type Basic = FifoClass<B>;
    type Extended = NoClass;
    const NAME: &'static str = "fifo";

    fn basic(&self) -> &FifoClass<B> {
        &self.basic
    }
    fn basic_mut(&mut self) -> &mut FifoClass<B> {
        &mut self.basic
    }
    fn extended(&self) -> &NoClass {
        &self.none
    }
    fn extended_mut(&mut self) -> &mut NoClass {
        &mut self.none
    }

    fn select(&mut self) -> Option<ClassId> {
        if self.basic.is_empty() {
            None
        } else {
            Some(ClassId::Basic)
        }
    }
}

/// Extended class first, basic class protected by [`Fairness`]
pub struct Prioritized<C, const B: usize> {
    basic: FifoClass<B>,
    extended: C,
    fairness: Fairness,
    /// Extended dispatches in a row while basic work waited
    streak: u16,
}

/// High-priority FIFO over the basic class
pub type PriorityPolicy<const H: usize, const B: usize> = Prioritized<FifoClass<H>, B>;
/// Earliest-deadline-first over the basic class
pub type EdfPolicy<const D: usize, const B: usize> = Prioritized<DeadlineClass<D>, B>;

impl<C: SchedClass, const B: usize> Prioritized<C, B> {
    pub const fn with_class(extended: C, fairness: Fairness) -> Self {
        Self {
            basic: FifoClass::new(BASIC),
            extended,
            fairness,
            streak: 0,
        }
    }

    pub const fn fairness(&self) -> Fairness {
        self.fairness
    }

    /// Current extended streak
    pub const fn streak(&self) -> u16 {
        self.streak
    }
}

impl<const H: usize, const B: usize> Prioritized<FifoClass<H>, B> {
    /// High-priority FIFO policy
    pub const fn priority(fairness: Fairness) -> Self {
        Self::with_class(FifoClass::new(HIGH_PRIORITY), fairness)
    }
}

impl<const D: usize, const B: usize> Prioritized<DeadlineClass<D>, B> {
    /// EDF policy
    pub const fn edf(fairness: Fairness) -> Self {
        Self::with_class(DeadlineClass::new(EDF), fairness)
    }
}

impl<C: SchedClass + Send, const B: usize> Policy for Prioritized<C, B> {
    type Basic = FifoClass<B>;
    type Extended = C;
    const NAME: &'static str = "prioritized";

    fn basic(&self) -> &FifoClass<B> {
        &self.basic
    }
    fn basic_mut(&mut self) -> &mut FifoClass<B> {
        &mut self.basic
    }
    fn extended(&self) -> &C {
        &self.extended
    }
    fn extended_mut(&mut self) -> &mut C {
        &mut self.extended
    }

    fn select(&mut self) -> Option<ClassId> {
        let basic_ready = !self.basic.is_empty();
        let extended_ready = !self.extended.is_empty();

        match (basic_ready, extended_ready) {
            (false, false) => None,
            (true, false) => {
                self.streak = 0;
                Some(ClassId::Basic)
            }
            (false, true) => {
                // Nobody is waiting, no debt accrues
                self.streak = 0;
                Some(ClassId::Extended)
            }
            (true, true) => {
                if self.streak >= self.fairness.max_streak {
                    self.streak = 0;
                    Some(ClassId::Basic)
                } else {
                    self.streak += 1;
                    Some(ClassId::Extended)
                }
            }
        }
    }

    fn reset(&mut self) {
        self.basic.reset();
        self.extended.reset();
        self.streak = 0;
    }
}

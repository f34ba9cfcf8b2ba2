//! Error-adaptive integration by repeated bisection.
//!
//! The work unit is a [`RefinementNode`]: two sibling intervals plus the
//! one-shot estimate of their parent. Processing a node splits both
//! siblings, compares the two-level estimate with the parent's and either
//! accepts it or queues both siblings' nodes for another round:
//!
//! ```text
//! |est(left) + est(right) - est(parent)| < (4^p - 1) · width · error_goal
//! ```
//!
//! The test is only trusted from [`MIN_DEPTH`] levels below the whole
//! interval onwards. A single bisection can agree with the one-shot
//! estimate by coincidence, for instance when a jump sits exactly on a
//! midpoint, so the first levels are always refined.
//!
//! Two escape hatches guarantee termination. Once the number of subdivisions
//! reaches the ceiling, or the wall-clock limit has elapsed, every remaining
//! node is accepted as it comes and the result is flagged as degraded. A
//! node whose halves are too narrow to bisect at floating-point resolution
//! is accepted the same way.
//!
//! In parallel mode the queue is shared by a per-call pool of workers. The
//! queue (with the subdivision counter) and the accumulated result live
//! behind two separate locks which are never held together; splitting
//! happens outside both. A worker that finds the queue empty waits while any
//! other worker is still splitting, and exits only once the queue is empty
//! and nothing is in flight.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::error::{check_bounds, check_threads, QuadratureError};
use crate::integrand::Integrand;
use crate::rule::{RefinementNode, Rule};
use crate::settings::{check_error_goal, time_limit};
use crate::workers::{build_pool, catch_panic, FirstFailure};

/// Default ceiling on the number of subdivisions.
pub const DEFAULT_MAX_SUBDIVISIONS: usize = 100_000;

/// Depth below the whole interval from which a passing error test is
/// accepted. The initial node has depth 0.
pub const MIN_DEPTH: u32 = 2;

/// Stores the result of an adaptive integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveResult {
    /// The estimated value of the integral.
    pub value: f64,
    /// The number of subdivisions performed (1 for the initial split).
    pub subdivisions: usize,
    /// Wall-clock time spent.
    pub elapsed: Duration,
    /// Whether some interval was accepted without meeting the error goal
    /// because the subdivision ceiling or the time limit was reached.
    pub degraded: bool,
}

/// The adaptive integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adaptive {
    rule: Rule,
    error_goal: f64,
    max_subdivisions: usize,
    max_time: Option<Duration>,
    threads: usize,
}

impl Adaptive {
    /// Creates a single-threaded integrator with the default subdivision
    /// ceiling and no time limit.
    ///
    /// # Arguments
    ///
    /// * `rule`: The Newton–Cotes rule applied on every interval.
    /// * `error_goal`: The target error per unit of interval width. Must be
    ///   finite and positive; this is checked when integrating.
    pub fn new(rule: Rule, error_goal: f64) -> Self {
        Adaptive {
            rule,
            error_goal,
            max_subdivisions: DEFAULT_MAX_SUBDIVISIONS,
            max_time: None,
            threads: 1,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_max_subdivisions(mut self, max_subdivisions: usize) -> Self {
        self.max_subdivisions = max_subdivisions;
        self
    }

    /// Sets the wall-clock limit; `None` removes it.
    pub fn with_max_time(mut self, max_time: Option<Duration>) -> Self {
        self.max_time = max_time;
        self
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Integrates `f` over `[a, b]`, in parallel when more than one thread
    /// was requested.
    pub fn integrate<F: Integrand + Sync + ?Sized>(
        &self,
        f: &F,
        a: f64,
        b: f64,
    ) -> Result<AdaptiveResult, QuadratureError> {
        self.validate(a, b)?;
        if self.threads == 1 {
            self.run_sequential(f, a, b)
        } else {
            self.run_parallel(f, a, b)
        }
    }

    fn validate(&self, a: f64, b: f64) -> Result<(), QuadratureError> {
        check_bounds(a, b)?;
        check_threads(self.threads)?;
        check_error_goal(self.error_goal)?;
        if self.max_subdivisions == 0 {
            return Err(QuadratureError::ZeroMaxSubdivisions);
        }
        Ok(())
    }

    fn refiner<'a, F: Integrand + ?Sized>(&self, f: &'a F, start: Instant) -> Refiner<'a, F> {
        Refiner {
            rule: self.rule,
            f,
            error_goal: self.error_goal,
            max_subdivisions: self.max_subdivisions,
            max_time: self.max_time,
            start,
        }
    }

    fn run_sequential<F: Integrand + ?Sized>(
        &self,
        f: &F,
        a: f64,
        b: f64,
    ) -> Result<AdaptiveResult, QuadratureError> {
        let start = Instant::now();
        if a == b {
            return Ok(empty_result(start));
        }
        debug!(
            "{} adaptive over [{a}, {b}], error goal {:e}, sequential",
            self.rule, self.error_goal
        );

        let refiner = self.refiner(f, start);
        let mut queue = VecDeque::from([(refiner.first_node(a, b), 0)]);
        let mut subdivisions = 1;
        let mut value = 0.0;
        let mut degraded = false;
        let mut deadline_passed = false;

        while let Some((node, depth)) = queue.pop_front() {
            deadline_passed = deadline_passed || refiner.deadline_passed();
            let exhausted = deadline_passed || subdivisions >= self.max_subdivisions;
            match refiner.step(&node, depth, exhausted) {
                Outcome::Accepted { value: v, forced } => {
                    value += v;
                    degraded |= forced;
                }
                Outcome::Refine(left, right) => {
                    queue.push_back((left, depth + 1));
                    queue.push_back((right, depth + 1));
                    subdivisions += 1;
                }
            }
        }

        Ok(self.finish(value, subdivisions, start, degraded))
    }

    fn run_parallel<F: Integrand + Sync + ?Sized>(
        &self,
        f: &F,
        a: f64,
        b: f64,
    ) -> Result<AdaptiveResult, QuadratureError> {
        let start = Instant::now();
        if a == b {
            return Ok(empty_result(start));
        }
        debug!(
            "{} adaptive over [{a}, {b}], error goal {:e}, {} threads",
            self.rule, self.error_goal, self.threads
        );

        let pool = build_pool(self.threads)?;
        let refiner = self.refiner(f, start);
        let first = catch_panic(|| refiner.first_node(a, b))?;
        let shared = Shared {
            refiner,
            queue: Mutex::new(WorkQueue {
                nodes: VecDeque::from([(first, 0)]),
                in_flight: 0,
                subdivisions: 1,
                aborted: false,
            }),
            work_changed: Condvar::new(),
            result: Mutex::new(Accumulator::default()),
            failure: FirstFailure::default(),
        };

        pool.scope(|scope| {
            for id in 0..self.threads {
                let shared = &shared;
                scope.spawn(move |_| shared.work(id));
            }
        });

        let Shared {
            queue,
            result,
            failure,
            ..
        } = shared;
        failure.into_result()?;
        let subdivisions = queue.into_inner().subdivisions;
        let Accumulator { value, degraded } = result.into_inner();
        Ok(self.finish(value, subdivisions, start, degraded))
    }

    fn finish(
        &self,
        value: f64,
        subdivisions: usize,
        start: Instant,
        degraded: bool,
    ) -> AdaptiveResult {
        let elapsed = start.elapsed();
        if degraded {
            warn!(
                "{}: error goal {:e} not met within {} subdivisions / {:?}, returning best estimate",
                self.rule, self.error_goal, subdivisions, elapsed
            );
        }
        debug!(
            "{} adaptive result {value} after {subdivisions} subdivisions in {elapsed:?}",
            self.rule
        );
        AdaptiveResult {
            value,
            subdivisions,
            elapsed,
            degraded,
        }
    }
}

fn empty_result(start: Instant) -> AdaptiveResult {
    AdaptiveResult {
        value: 0.0,
        subdivisions: 0,
        elapsed: start.elapsed(),
        degraded: false,
    }
}

/// Integrates `f` over `[a, b]` on the calling thread.
///
/// `max_seconds == 0` means no time limit.
pub fn integrate_adaptive_sequential<F: Integrand + ?Sized>(
    rule: Rule,
    f: &F,
    a: f64,
    b: f64,
    error_goal: f64,
    max_subdivisions: usize,
    max_seconds: f64,
) -> Result<AdaptiveResult, QuadratureError> {
    let adaptive = Adaptive::new(rule, error_goal)
        .with_max_subdivisions(max_subdivisions)
        .with_max_time(time_limit(max_seconds)?);
    adaptive.validate(a, b)?;
    adaptive.run_sequential(f, a, b)
}

/// Integrates `f` over `[a, b]` with `threads` workers sharing one queue.
///
/// `max_seconds == 0` means no time limit.
#[allow(clippy::too_many_arguments)]
pub fn integrate_adaptive_parallel<F: Integrand + Sync + ?Sized>(
    rule: Rule,
    f: &F,
    a: f64,
    b: f64,
    threads: usize,
    error_goal: f64,
    max_subdivisions: usize,
    max_seconds: f64,
) -> Result<AdaptiveResult, QuadratureError> {
    let adaptive = Adaptive::new(rule, error_goal)
        .with_threads(threads)
        .with_max_subdivisions(max_subdivisions)
        .with_max_time(time_limit(max_seconds)?);
    adaptive.validate(a, b)?;
    adaptive.run_parallel(f, a, b)
}

enum Outcome {
    Accepted { value: f64, forced: bool },
    Refine(RefinementNode, RefinementNode),
}

/// The per-call parameters of the refinement step.
struct Refiner<'a, F: ?Sized> {
    rule: Rule,
    f: &'a F,
    error_goal: f64,
    max_subdivisions: usize,
    max_time: Option<Duration>,
    start: Instant,
}

impl<F: Integrand + ?Sized> Refiner<'_, F> {
    fn first_node(&self, a: f64, b: f64) -> RefinementNode {
        let whole = self.rule.whole(self.f, a, b);
        self.rule.split(self.f, &whole)
    }

    fn deadline_passed(&self) -> bool {
        self.max_time
            .is_some_and(|limit| self.start.elapsed() > limit)
    }

    /// Splits both halves of `node` and applies the error test.
    ///
    /// A passing test is ignored above [`MIN_DEPTH`]. When `exhausted` is set
    /// the refined estimate is accepted regardless.
    fn step(&self, node: &RefinementNode, depth: u32, exhausted: bool) -> Outcome {
        let left = self.rule.split(self.f, &node.left);
        let right = self.rule.split(self.f, &node.right);
        let refined = left.estimate + right.estimate;

        let tolerance = self.rule.error_constant() * node.width() * self.error_goal;
        let converged = (refined - node.estimate).abs() < tolerance;
        if converged && depth >= MIN_DEPTH {
            return Outcome::Accepted {
                value: refined,
                forced: false,
            };
        }
        if exhausted || !resolvable(&left) || !resolvable(&right) {
            return Outcome::Accepted {
                value: refined,
                forced: !converged,
            };
        }
        Outcome::Refine(left, right)
    }
}

/// Whether both halves of `node` can be split again with distinct sample
/// points and sampler neighbours.
fn resolvable(node: &RefinementNode) -> bool {
    [&node.left, &node.right].into_iter().all(|interval| {
        let width = interval.width();
        let scale = interval.a.abs().max(interval.b.abs());
        width >= f64::MIN_POSITIVE && width > 16.0 * f64::EPSILON * scale
    })
}

struct WorkQueue {
    /// Pending nodes with their depth.
    nodes: VecDeque<(RefinementNode, u32)>,
    /// Nodes popped but not yet accepted or re-queued.
    in_flight: usize,
    subdivisions: usize,
    aborted: bool,
}

#[derive(Default)]
struct Accumulator {
    value: f64,
    degraded: bool,
}

struct Shared<'a, F: ?Sized> {
    refiner: Refiner<'a, F>,
    queue: Mutex<WorkQueue>,
    work_changed: Condvar,
    result: Mutex<Accumulator>,
    failure: FirstFailure,
}

impl<F: Integrand + ?Sized> Shared<'_, F> {
    /// The worker loop.
    fn work(&self, id: usize) {
        trace!("worker {id} started");
        let mut deadline_passed = false;
        let mut processed = 0usize;

        loop {
            deadline_passed = deadline_passed || self.refiner.deadline_passed();
            let Some((node, depth, exhausted)) = self.next(deadline_passed) else {
                break;
            };
            let step = || self.refiner.step(&node, depth, exhausted);
            let Some(outcome) = self.failure.catch(step) else {
                self.abort();
                break;
            };
            processed += 1;

            match outcome {
                Outcome::Accepted { value, forced } => {
                    self.accumulate(value, forced);
                    self.done();
                }
                Outcome::Refine(left, right) => {
                    if let Some((left, right)) = self.requeue(left, right, depth + 1) {
                        self.accumulate(left.estimate + right.estimate, true);
                        self.done();
                    }
                }
            }
        }
        trace!("worker {id} exiting after {processed} nodes");
    }

    /// Pops the next node, waiting while the queue is empty but other
    /// workers may still push. Returns `None` when all work is done.
    fn next(&self, deadline_passed: bool) -> Option<(RefinementNode, u32, bool)> {
        let mut queue = self.queue.lock();
        loop {
            if queue.aborted {
                return None;
            }
            if let Some((node, depth)) = queue.nodes.pop_front() {
                queue.in_flight += 1;
                let exhausted =
                    deadline_passed || queue.subdivisions >= self.refiner.max_subdivisions;
                return Some((node, depth, exhausted));
            }
            if queue.in_flight == 0 {
                return None;
            }
            self.work_changed.wait(&mut queue);
        }
    }

    /// Queues both children unless the ceiling was reached meanwhile, in
    /// which case they are handed back to be accepted.
    fn requeue(
        &self,
        left: RefinementNode,
        right: RefinementNode,
        depth: u32,
    ) -> Option<(RefinementNode, RefinementNode)> {
        let mut queue = self.queue.lock();
        if queue.subdivisions >= self.refiner.max_subdivisions {
            return Some((left, right));
        }
        queue.nodes.push_back((left, depth));
        queue.nodes.push_back((right, depth));
        queue.subdivisions += 1;
        queue.in_flight -= 1;
        self.work_changed.notify_all();
        None
    }

    fn accumulate(&self, value: f64, forced: bool) {
        let mut result = self.result.lock();
        result.value += value;
        result.degraded |= forced;
    }

    fn done(&self) {
        let mut queue = self.queue.lock();
        queue.in_flight -= 1;
        if queue.in_flight == 0 && queue.nodes.is_empty() {
            self.work_changed.notify_all();
        }
    }

    fn abort(&self) {
        let mut queue = self.queue.lock();
        queue.aborted = true;
        queue.in_flight -= 1;
        self.work_changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::LN_2;

    #[test]
    fn inverse_converges_to_ln2() {
        for rule in Rule::ALL {
            let f = |x: f64| 1.0 / x;
            let seq = integrate_adaptive_sequential(rule, &f, 1.0, 2.0, 1e-6, 100_000, 5.0).unwrap();
            assert_abs_diff_eq!(seq.value, LN_2, epsilon = 1e-5);
            assert!(seq.subdivisions >= 1);
            assert!(!seq.degraded);

            let par = integrate_adaptive_parallel(rule, &f, 1.0, 2.0, 4, 1e-6, 100_000, 5.0).unwrap();
            assert_abs_diff_eq!(par.value, LN_2, epsilon = 1e-5);
            assert!(par.subdivisions >= 1);
        }
    }

    #[test]
    fn floor_converges_despite_the_jump() {
        let f = |x: f64| x.floor();
        for rule in Rule::ALL {
            let seq = integrate_adaptive_sequential(rule, &f, 0.0, 2.0, 1e-9, 100_000, 5.0).unwrap();
            assert_abs_diff_eq!(seq.value, 1.0, epsilon = 1e-6);
            let par = integrate_adaptive_parallel(rule, &f, 0.0, 2.0, 3, 1e-9, 100_000, 5.0).unwrap();
            assert_abs_diff_eq!(par.value, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn jump_on_the_midpoint_is_not_accepted_at_the_top() {
        // One bisection of [0, 2] agrees with the whole-interval estimate for
        // these rules, which would stop at 2.0 and 1.25.
        let f = |x: f64| x.floor();
        for rule in [Rule::Trapezoid, Rule::Simpson38] {
            for threads in [1, 2] {
                let result = Adaptive::new(rule, 1e-6)
                    .with_threads(threads)
                    .integrate(&f, 0.0, 2.0)
                    .unwrap();
                assert!(result.subdivisions > 1, "{rule}");
                assert_abs_diff_eq!(result.value, 1.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn ceiling_of_one_returns_the_first_split() {
        let result = Adaptive::new(Rule::Simpson, 1e-6)
            .with_max_subdivisions(1)
            .integrate(&f64::exp, 0.0, 1.0)
            .unwrap();
        assert_eq!(result.subdivisions, 1);
        assert_abs_diff_eq!(result.value, 1.0_f64.exp() - 1.0, epsilon = 1e-4);
    }

    #[test]
    fn empty_domain_uses_no_subdivisions() {
        for rule in Rule::ALL {
            let seq = integrate_adaptive_sequential(rule, &f64::exp, 1.5, 1.5, 1e-6, 10, 1.0).unwrap();
            assert_eq!((seq.value, seq.subdivisions), (0.0, 0));
            let par = integrate_adaptive_parallel(rule, &f64::exp, 1.5, 1.5, 2, 1e-6, 10, 1.0).unwrap();
            assert_eq!((par.value, par.subdivisions), (0.0, 0));
        }
    }

    #[test]
    fn sequential_is_deterministic() {
        let f = |x: f64| (5.0 * x).sin() * x.exp();
        let first = integrate_adaptive_sequential(Rule::Simpson, &f, 0.0, 3.0, 1e-8, 10_000, 0.0).unwrap();
        let second = integrate_adaptive_sequential(Rule::Simpson, &f, 0.0, 3.0, 1e-8, 10_000, 0.0).unwrap();
        assert_eq!(first.value, second.value);
        assert_eq!(first.subdivisions, second.subdivisions);
    }

    #[test]
    fn tighter_goals_give_smaller_errors() {
        let exact = 1.0_f64.exp() - 1.0;
        for rule in Rule::ALL {
            let loose = integrate_adaptive_sequential(rule, &f64::exp, 0.0, 1.0, 1e-3, 100_000, 0.0).unwrap();
            let tight = integrate_adaptive_sequential(rule, &f64::exp, 0.0, 1.0, 1e-9, 100_000, 0.0).unwrap();
            assert!((tight.value - exact).abs() <= (loose.value - exact).abs(), "{rule}");
            assert!(tight.subdivisions >= loose.subdivisions, "{rule}");
            assert_abs_diff_eq!(tight.value, exact, epsilon = 1e-8);
        }
    }

    #[test]
    fn ceiling_degrades_gracefully() {
        let f = |x: f64| (1.0 / x).sin();
        for threads in [1, 4] {
            let result = Adaptive::new(Rule::Trapezoid, 1e-14)
                .with_threads(threads)
                .with_max_subdivisions(25)
                .integrate(&f, 1e-3, 1.0)
                .unwrap();
            assert!(result.subdivisions <= 25);
            assert!(result.degraded);
            assert!(result.value.is_finite());
        }
    }

    #[test]
    fn deadline_bounds_the_running_time() {
        let f = |x: f64| {
            std::thread::sleep(Duration::from_micros(20));
            (1.0 / x).sin()
        };
        for threads in [1, 4] {
            let started = Instant::now();
            let result = integrate_adaptive_parallel(
                Rule::Simpson,
                &f,
                1e-9,
                1.0,
                threads,
                1e-300,
                usize::MAX,
                0.2,
            )
            .unwrap();
            assert!(started.elapsed() < Duration::from_secs(3));
            assert!(result.degraded);
        }
    }

    #[test]
    fn parallel_agrees_with_sequential() {
        let f = |x: f64| 1.0 / (1.0 + 25.0 * x * x);
        let exact = 2.0 * 5.0_f64.atan() / 5.0;
        for rule in Rule::ALL {
            let seq = integrate_adaptive_sequential(rule, &f, -1.0, 1.0, 1e-10, 100_000, 0.0).unwrap();
            for threads in [2, 3, 8] {
                let par = integrate_adaptive_parallel(rule, &f, -1.0, 1.0, threads, 1e-10, 100_000, 0.0)
                    .unwrap();
                assert_abs_diff_eq!(par.value, seq.value, epsilon = 1e-8);
            }
            assert_abs_diff_eq!(seq.value, exact, epsilon = 1e-8);
        }
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let f = |x: f64| x;
        assert!(matches!(
            integrate_adaptive_sequential(Rule::Boole, &f, 2.0, 1.0, 1e-6, 10, 1.0),
            Err(QuadratureError::InvalidBounds { .. })
        ));
        assert_eq!(
            integrate_adaptive_sequential(Rule::Boole, &f, 0.0, 1.0, 0.0, 10, 1.0),
            Err(QuadratureError::InvalidErrorGoal(0.0))
        );
        assert_eq!(
            integrate_adaptive_sequential(Rule::Boole, &f, 0.0, 1.0, 1e-6, 0, 1.0),
            Err(QuadratureError::ZeroMaxSubdivisions)
        );
        assert_eq!(
            integrate_adaptive_parallel(Rule::Boole, &f, 0.0, 1.0, 0, 1e-6, 10, 1.0),
            Err(QuadratureError::ZeroThreads)
        );
        assert_eq!(
            integrate_adaptive_parallel(Rule::Boole, &f, 0.0, 1.0, 2, 1e-6, 10, -1.0),
            Err(QuadratureError::InvalidTimeLimit(-1.0))
        );
    }

    #[test]
    fn panic_in_the_first_split_reaches_the_caller() {
        let f = |x: f64| {
            if x < 0.1 {
                panic!("bad left end");
            }
            x
        };
        let result = integrate_adaptive_parallel(Rule::Simpson, &f, 0.0, 1.0, 2, 1e-6, 100, 0.0);
        assert_eq!(
            result,
            Err(QuadratureError::WorkerPanicked("bad left end".to_string()))
        );
    }

    #[test]
    fn worker_panic_reaches_the_caller() {
        let f = |x: f64| {
            if (0.3..0.31).contains(&x) {
                panic!("bad sample");
            }
            (10.0 * x).sin()
        };
        let result = integrate_adaptive_parallel(Rule::Trapezoid, &f, 0.0, 1.0, 4, 1e-12, 100_000, 5.0);
        assert_eq!(
            result,
            Err(QuadratureError::WorkerPanicked("bad sample".to_string()))
        );
    }
}

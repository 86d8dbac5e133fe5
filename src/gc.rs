//! # Garbage Collector
//!
//! Arrays and objects are acyclic on their own; cycles in script data can
//! only pass through [`Variable`] cells. The collector therefore tracks
//! variable cells and nothing else.
//!
//! ## Generations
//! Cells live in three generations, 0 (youngest) to 2 (oldest). A fresh
//! cell enters generation 0; survivors of a collection are promoted one
//! generation. Each generation has a threshold: when the cell count exceeds
//! it after a new cell is tracked, that generation is collected. The
//! generations are purely an optimisation; correctness comes from the
//! mark/sweep pass alone.
//!
//! ## Reachability
//! A traversal over the values of all tracked cells counts the *internal*
//! references to every cell (through `collect_variables`). A cell whose
//! `Rc` strong count exceeds its internal count is referenced from outside
//! the tracked graph (a reference stack, the `std` tree, a host handle) and
//! is a root. Cells reachable from a root survive; the rest are garbage.
//! Sweeping clears the stored values of garbage cells, which breaks their
//! cycles, then drops the tracking handles.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;
use crate::variable::{Variable, VariableCollector, VarRef};

/// Number of generations.
pub const GENERATION_COUNT: usize = 3;

/// Oldest generation index.
pub const GENERATION_OLDEST: usize = GENERATION_COUNT - 1;

struct Generation {
    tracked: Vec<VarRef>,
    threshold: usize,
}

/// Generational collector for variable cells.
pub struct GarbageCollector {
    gens: RefCell<[Generation; 3]>,
}

impl Default for GarbageCollector {
    fn default() -> GarbageCollector {
        GarbageCollector {
            gens: RefCell::new([
                Generation { tracked: Vec::new(), threshold: 100 },
                Generation { tracked: Vec::new(), threshold: 1_000 },
                Generation { tracked: Vec::new(), threshold: 10_000 },
            ]),
        }
    }
}

impl GarbageCollector {
    pub fn new() -> GarbageCollector {
        GarbageCollector::default()
    }

    /// Create a fresh tracked variable in generation 0. May trigger a
    /// collection when a threshold is exceeded.
    pub fn create_variable(&self, init: Value) -> VarRef {
        let var = Variable::new(init);
        self.gens.borrow_mut()[0].tracked.push(var.clone());

        for gen in 0..GENERATION_COUNT {
            let over = {
                let gens = self.gens.borrow();
                gens[gen].tracked.len() > gens[gen].threshold
            };
            if over {
                self.collect_variables(gen);
            }
        }
        var
    }

    /// Track an externally created cell in generation 0.
    pub fn track_variable(&self, var: &VarRef) {
        self.gens.borrow_mut()[0].tracked.push(var.clone());
    }

    /// Number of cells tracked in `gen`.
    ///
    /// # Panics
    /// Panics when `gen` is not in `0..3`; callers validate first.
    pub fn count_tracked_variables(&self, gen: usize) -> usize {
        self.gens.borrow()[gen].tracked.len()
    }

    pub fn get_threshold(&self, gen: usize) -> usize {
        self.gens.borrow()[gen].threshold
    }

    /// Set the promotion threshold of `gen`, returning the previous value.
    pub fn set_threshold(&self, gen: usize, threshold: usize) -> usize {
        let mut gens = self.gens.borrow_mut();
        std::mem::replace(&mut gens[gen].threshold, threshold)
    }

    /// Collect all generations up to and including `limit`. Returns the
    /// number of cells reclaimed.
    pub fn collect_variables(&self, limit: usize) -> usize {
        let limit = limit.min(GENERATION_OLDEST);

        // Detach every tracked list so traversal cannot observe a borrow.
        let mut lists: [Vec<VarRef>; 3] = {
            let mut gens = self.gens.borrow_mut();
            [
                std::mem::take(&mut gens[0].tracked),
                std::mem::take(&mut gens[1].tracked),
                std::mem::take(&mut gens[2].tracked),
            ]
        };

        // Count internal references. Tracked cells are pre-marked so their
        // values are traversed exactly once even when rediscovered.
        let mut edges = VariableCollector::new();
        for list in lists.iter() {
            for var in list {
                edges.mark_traversed(var);
            }
        }
        for list in lists.iter() {
            for var in list {
                let value = var.borrow().value().clone();
                value.collect_variables(&mut edges);
            }
        }
        while let Some(pending) = edges.next_pending() {
            let value = pending.borrow().value().clone();
            value.collect_variables(&mut edges);
        }

        // A cell is a root when something outside the tracked graph holds
        // it. Our own handles: one in the detached list, one in the edge
        // map's pre-mark.
        let is_root = |var: &VarRef| {
            let addr = Rc::as_ptr(var) as usize;
            Rc::strong_count(var) > edges.edge_count(addr) + 2
        };

        let mut reachable = VariableCollector::new();
        for (gen, list) in lists.iter().enumerate() {
            for var in list {
                if (gen > limit) || is_root(var) {
                    reachable.record(var);
                }
            }
        }
        while let Some(pending) = reachable.next_pending() {
            let value = pending.borrow().value().clone();
            value.collect_variables(&mut reachable);
        }

        // Sweep the collected generations; promote survivors.
        let mut reclaimed = 0;
        let mut promoted: [Vec<VarRef>; 3] = Default::default();
        for gen in (0..=limit).rev() {
            for var in std::mem::take(&mut lists[gen]) {
                let addr = Rc::as_ptr(&var) as usize;
                if reachable.contains(addr) {
                    promoted[(gen + 1).min(GENERATION_OLDEST)].push(var);
                } else {
                    // Clearing the value breaks any cycle through this cell.
                    drop(var.borrow_mut().take_value());
                    reclaimed += 1;
                }
            }
        }

        let mut gens = self.gens.borrow_mut();
        for gen in 0..GENERATION_COUNT {
            gens[gen].tracked.append(&mut lists[gen]);
            gens[gen].tracked.append(&mut promoted[gen]);
        }

        log::debug!("garbage collection reclaimed {reclaimed} variable(s) up to generation {limit}");
        reclaimed
    }

    /// Final collection at interpreter shutdown. Cells that remain after
    /// this pass keep their values; remaining cycles leak deliberately.
    pub fn finalize(&self) -> usize {
        let reclaimed = self.collect_variables(GENERATION_OLDEST);
        let mut gens = self.gens.borrow_mut();
        for gen in gens.iter_mut() {
            gen.tracked.clear();
        }
        reclaimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{skey, Object};

    #[test]
    fn thresholds_report_previous_value() {
        let gc = GarbageCollector::new();
        let old = gc.get_threshold(0);
        assert_eq!(gc.set_threshold(0, 42), old);
        assert_eq!(gc.get_threshold(0), 42);
    }

    #[test]
    fn externally_held_cells_survive_collection() {
        let gc = GarbageCollector::new();
        let var = gc.create_variable(Value::Integer(1));
        assert_eq!(gc.count_tracked_variables(0), 1);

        assert_eq!(gc.collect_variables(GENERATION_OLDEST), 0);
        // The survivor was promoted out of generation 0.
        assert_eq!(gc.count_tracked_variables(0), 0);
        assert_eq!(gc.count_tracked_variables(1), 1);
        assert_eq!(var.borrow().value().clone(), Value::Integer(1));
    }

    #[test]
    fn unreferenced_cells_are_reclaimed() {
        let gc = GarbageCollector::new();
        {
            let _var = gc.create_variable(Value::Integer(1));
        }
        assert_eq!(gc.collect_variables(GENERATION_OLDEST), 1);
        assert_eq!(gc.count_tracked_variables(0), 0);
        assert_eq!(gc.count_tracked_variables(1), 0);
    }

    /// Opaque that exposes a captured variable to the collector, standing in
    /// for a closure capture.
    struct Capture {
        var: VarRef,
    }

    impl crate::variable::Opaque for Capture {
        fn describe(&self) -> String {
            "capture".to_string()
        }
        fn clone_opaque(&self) -> crate::variable::OpaqueRef {
            crate::value::make_opaque(Capture { var: self.var.clone() })
        }
        fn collect_variables(&self, collector: &mut VariableCollector) {
            collector.record(&self.var);
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn cycles_through_variables_are_reclaimed() {
        let gc = GarbageCollector::new();
        let a = gc.create_variable(Value::Null);
        let b = gc.create_variable(Value::Null);

        // a -> b -> a, closed through opaque captures inside objects.
        let mut obj = Object::new();
        obj.insert(skey("next"), Value::from(crate::value::make_opaque(Capture { var: b.clone() })));
        *a.borrow_mut().value_mut() = Value::from(obj);

        let mut obj = Object::new();
        obj.insert(skey("next"), Value::from(crate::value::make_opaque(Capture { var: a.clone() })));
        *b.borrow_mut().value_mut() = Value::from(obj);

        // Still externally referenced: nothing to reclaim.
        assert_eq!(gc.collect_variables(GENERATION_OLDEST), 0);

        drop(a);
        drop(b);
        assert_eq!(gc.collect_variables(GENERATION_OLDEST), 2);
    }

    #[test]
    fn threshold_overflow_triggers_collection() {
        let gc = GarbageCollector::new();
        gc.set_threshold(0, 4);
        for _ in 0..6 {
            // Dropped immediately: garbage as soon as created.
            let _ = gc.create_variable(Value::Integer(0));
        }
        // The automatic pass keeps the population at or below the threshold.
        assert!(gc.count_tracked_variables(0) <= 5);
    }
}

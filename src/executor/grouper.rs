//! Test partitioning
//!
//! Splits the selected tests into the three execution classes in a single
//! pass: free parallel tests, keyed groups, and globally exclusive tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::models::{ConcurrencyMode, ConstraintKeySet, TestUnit};

/// Tests sharing one exact key set, run one after another
#[derive(Debug)]
pub struct KeyedGroup {
    pub keys: ConstraintKeySet,
    pub tests: Vec<Arc<TestUnit>>,
}

/// Tests partitioned by concurrency mode
#[derive(Debug, Default)]
pub struct GroupedTests {
    pub parallel: Vec<Arc<TestUnit>>,
    pub not_in_parallel: VecDeque<Arc<TestUnit>>,
    pub keyed: Vec<KeyedGroup>,
}

impl GroupedTests {
    /// Partition `tests`. Keyed groups keep first-seen order; tests inside a
    /// group and in the exclusive queue are sorted by declared order, ties by id.
    pub fn organise(tests: impl IntoIterator<Item = Arc<TestUnit>>) -> Self {
        let mut grouped = GroupedTests::default();
        let mut not_in_parallel = Vec::new();
        let mut group_index: HashMap<ConstraintKeySet, usize> = HashMap::new();

        for test in tests {
            match test.mode() {
                ConcurrencyMode::Parallel => grouped.parallel.push(test),
                ConcurrencyMode::NotInParallel => not_in_parallel.push(test),
                ConcurrencyMode::Keyed(keys) => {
                    let index = *group_index.entry(keys.clone()).or_insert_with(|| {
                        grouped.keyed.push(KeyedGroup {
                            keys: keys.clone(),
                            tests: Vec::new(),
                        });
                        grouped.keyed.len() - 1
                    });
                    grouped.keyed[index].tests.push(test);
                }
            }
        }

        sort_by_declared_order(&mut not_in_parallel);
        grouped.not_in_parallel = not_in_parallel.into();
        for group in &mut grouped.keyed {
            sort_by_declared_order(&mut group.tests);
        }

        grouped
    }

    pub fn len(&self) -> usize {
        self.parallel.len()
            + self.not_in_parallel.len()
            + self.keyed.iter().map(|g| g.tests.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sort_by_declared_order(tests: &mut [Arc<TestUnit>]) {
    tests.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id())));
}

//! Scope lifecycle tracking
//!
//! Knows which selected tests belong to each class and assembly, hands out
//! the shared context for each scope, and reports when the last test of a
//! scope has completed so its after hooks can run exactly once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{AssemblyHookContext, ClassHookContext, TestUnit};

struct ScopeEntry<C> {
    context: Arc<C>,
    remaining: usize,
}

/// Scopes whose last test just completed
#[derive(Debug, Default)]
pub struct CompletedScopes {
    pub class: Option<Arc<ClassHookContext>>,
    pub assembly: Option<Arc<AssemblyHookContext>>,
}

/// Per-run bookkeeping of class and assembly membership
pub struct ScopeTracker {
    classes: Mutex<HashMap<String, ScopeEntry<ClassHookContext>>>,
    assemblies: Mutex<HashMap<String, ScopeEntry<AssemblyHookContext>>>,
}

impl ScopeTracker {
    pub fn new(tests: &[Arc<TestUnit>]) -> Self {
        let mut classes: HashMap<String, ScopeEntry<ClassHookContext>> = HashMap::new();
        let mut assemblies: HashMap<String, ScopeEntry<AssemblyHookContext>> = HashMap::new();
        let mut class_contexts: HashMap<String, ClassHookContext> = HashMap::new();
        let mut assembly_contexts: HashMap<String, AssemblyHookContext> = HashMap::new();

        for test in tests {
            let class = class_contexts
                .entry(test.class_scope().to_string())
                .or_insert_with(|| ClassHookContext {
                    class_id: test.class_scope().to_string(),
                    assembly_id: test.assembly_scope().to_string(),
                    tests: Vec::new(),
                });
            class.tests.push(test.id().to_string());

            let assembly = assembly_contexts
                .entry(test.assembly_scope().to_string())
                .or_insert_with(|| AssemblyHookContext {
                    assembly_id: test.assembly_scope().to_string(),
                    ..Default::default()
                });
            if !assembly.classes.iter().any(|c| c == test.class_scope()) {
                assembly.classes.push(test.class_scope().to_string());
            }
            assembly.tests.push(test.id().to_string());
        }

        for (id, context) in class_contexts {
            let remaining = context.tests.len();
            classes.insert(
                id,
                ScopeEntry {
                    context: Arc::new(context),
                    remaining,
                },
            );
        }
        for (id, context) in assembly_contexts {
            let remaining = context.tests.len();
            assemblies.insert(
                id,
                ScopeEntry {
                    context: Arc::new(context),
                    remaining,
                },
            );
        }

        Self {
            classes: Mutex::new(classes),
            assemblies: Mutex::new(assemblies),
        }
    }

    pub fn class_context(&self, class_id: &str) -> Option<Arc<ClassHookContext>> {
        self.classes.lock().get(class_id).map(|e| e.context.clone())
    }

    pub fn assembly_context(&self, assembly_id: &str) -> Option<Arc<AssemblyHookContext>> {
        self.assemblies.lock().get(assembly_id).map(|e| e.context.clone())
    }

    /// Record that `test` finished; returns the scopes it was the last test of
    pub fn complete(&self, test: &TestUnit) -> CompletedScopes {
        CompletedScopes {
            class: countdown(&self.classes, test.class_scope()),
            assembly: countdown(&self.assemblies, test.assembly_scope()),
        }
    }
}

fn countdown<C>(scopes: &Mutex<HashMap<String, ScopeEntry<C>>>, id: &str) -> Option<Arc<C>> {
    let mut scopes = scopes.lock();
    let entry = scopes.get_mut(id)?;
    if entry.remaining == 0 {
        return None;
    }
    entry.remaining -= 1;
    (entry.remaining == 0).then(|| entry.context.clone())
}

//! Scope contexts handed to hooks
//!
//! One context exists per scope instance: per test, per class id, per
//! assembly id, and one each for the session and the discovery pass.

use serde::Serialize;

use super::test_unit::TestUnit;

/// Context of a single running test
#[derive(Clone, Debug, Serialize)]
pub struct TestContext {
    pub test_id: String,
    pub display_name: String,
    pub class_scope: String,
    pub assembly_scope: String,
    pub order: i32,
}

impl From<&TestUnit> for TestContext {
    fn from(test: &TestUnit) -> Self {
        Self {
            test_id: test.id().to_string(),
            display_name: test.display_name().to_string(),
            class_scope: test.class_scope().to_string(),
            assembly_scope: test.assembly_scope().to_string(),
            order: test.order(),
        }
    }
}

/// Shared by every test of one class scope
#[derive(Clone, Debug, Default, Serialize)]
pub struct ClassHookContext {
    pub class_id: String,
    pub assembly_id: String,
    pub tests: Vec<String>,
}

/// Shared by every test of one assembly scope
#[derive(Clone, Debug, Default, Serialize)]
pub struct AssemblyHookContext {
    pub assembly_id: String,
    pub classes: Vec<String>,
    pub tests: Vec<String>,
}

/// Singleton for the whole run
#[derive(Clone, Debug, Default, Serialize)]
pub struct SessionContext {
    pub session_id: String,
    pub tests: Vec<String>,
}

/// Singleton for the discovery pass; `tests` is empty before discovery
#[derive(Clone, Debug, Default, Serialize)]
pub struct DiscoveryContext {
    pub tests: Vec<String>,
}

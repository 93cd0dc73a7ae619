//! Test definitions
//!
//! What a loaded test module hands the engine: top-level tests and named
//! groups, each optionally wrapped by setup and teardown hooks.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use crate::executor::Done;
use crate::ledger::Ledger;

/// What a phase function hands back when it returns without faulting
pub enum Outcome {
    /// Completion will be signalled through `done()`
    Pending,
    /// Completion follows the settlement of this future
    Future(LocalBoxFuture<'static, anyhow::Result<()>>),
}

impl Outcome {
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        Outcome::Future(future.boxed_local())
    }

    /// An already-resolved future
    pub fn resolved() -> Self {
        Self::future(async { Ok(()) })
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "Outcome::Pending"),
            Outcome::Future(_) => write!(f, "Outcome::Future(..)"),
        }
    }
}

/// Return type of every phase function. `Err` is a synchronous fault.
pub type StepResult = anyhow::Result<Outcome>;

/// Test body: receives the ledger for this run
pub type TestFn = Rc<dyn Fn(Ledger) -> StepResult>;

/// Setup or teardown hook: receives the completion callback
pub type HookFn = Rc<dyn Fn(Done) -> StepResult>;

/// Flattened test, ready to become a test case
#[derive(Clone)]
pub struct CaseDefinition {
    pub name: String,
    pub body: TestFn,
    pub setup: Option<HookFn>,
    pub teardown: Option<HookFn>,
}

impl fmt::Debug for CaseDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseDefinition")
            .field("name", &self.name)
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .finish()
    }
}

/// A named group of tests sharing their own hooks
#[derive(Clone)]
pub struct Group {
    name: String,
    setup: Option<HookFn>,
    teardown: Option<HookFn>,
    tests: Vec<(String, TestFn)>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            teardown: None,
            tests: Vec::new(),
        }
    }

    pub fn setup(mut self, hook: impl Fn(Done) -> StepResult + 'static) -> Self {
        self.setup = Some(Rc::new(hook));
        self
    }

    pub fn teardown(mut self, hook: impl Fn(Done) -> StepResult + 'static) -> Self {
        self.teardown = Some(Rc::new(hook));
        self
    }

    pub fn test(mut self, name: impl Into<String>, body: impl Fn(Ledger) -> StepResult + 'static) -> Self {
        self.tests.push((name.into(), Rc::new(body)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One exported item of a test module
#[derive(Clone)]
pub enum Export {
    Test { name: String, body: TestFn },
    Group(Group),
}

/// The exports of one test module
#[derive(Clone, Default)]
pub struct Module {
    setup: Option<HookFn>,
    teardown: Option<HookFn>,
    exports: Vec<Export>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Setup applied to top-level tests
    pub fn setup(mut self, hook: impl Fn(Done) -> StepResult + 'static) -> Self {
        self.setup = Some(Rc::new(hook));
        self
    }

    /// Teardown applied to top-level tests
    pub fn teardown(mut self, hook: impl Fn(Done) -> StepResult + 'static) -> Self {
        self.teardown = Some(Rc::new(hook));
        self
    }

    pub fn test(mut self, name: impl Into<String>, body: impl Fn(Ledger) -> StepResult + 'static) -> Self {
        self.exports.push(Export::Test {
            name: name.into(),
            body: Rc::new(body),
        });
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.exports.push(Export::Group(group));
        self
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Resolve exports into an ordered flat list. Group members are named
    /// `"group : test"` and take the group's hooks, not the module's.
    pub fn flatten(self) -> Vec<CaseDefinition> {
        let mut cases = Vec::new();

        for export in self.exports {
            match export {
                Export::Test { name, body } => cases.push(CaseDefinition {
                    name,
                    body,
                    setup: self.setup.clone(),
                    teardown: self.teardown.clone(),
                }),
                Export::Group(group) => {
                    for (name, body) in group.tests {
                        cases.push(CaseDefinition {
                            name: format!("{} : {}", group.name, name),
                            body,
                            setup: group.setup.clone(),
                            teardown: group.teardown.clone(),
                        });
                    }
                }
            }
        }

        cases
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .field("exports", &self.exports.len())
            .finish()
    }
}

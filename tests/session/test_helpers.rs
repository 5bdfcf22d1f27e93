//! Shared fixtures for session BDD scenarios.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use camino::Utf8PathBuf;
use gitzilla::test_support::{MemoryClipboard, ScriptedRunner, base_config, utf8};
use gitzilla::{KeyPaths, PublishResult, Session, SessionError, TeardownReport};
use rstest::fixture;
use tempfile::TempDir;

pub type TestSession = Session<ScriptedRunner, MemoryClipboard>;

pub struct World {
    pub runner: ScriptedRunner,
    pub session: TestSession,
    pub key_paths: KeyPaths,
    pub source: Utf8PathBuf,
    pub working_copy: Option<Utf8PathBuf>,
    pub staged: Option<Utf8PathBuf>,
    pub published: Option<PublishResult>,
    pub error: Option<SessionError>,
    pub teardown: Option<TeardownReport>,
    pub _tmp: TempDir,
}

/// Scenario state shared between steps by reference.
#[derive(Clone)]
pub struct SessionContext {
    world: Rc<RefCell<World>>,
}

impl SessionContext {
    pub fn world(&self) -> RefMut<'_, World> {
        self.world.borrow_mut()
    }
}

#[fixture]
pub fn session_context() -> SessionContext {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let base = utf8(tmp.path());
    let source = base.join("report.txt");
    std::fs::write(&source, "quarterly numbers")
        .unwrap_or_else(|err| panic!("write upload source: {err}"));

    let runner = ScriptedRunner::new();
    let session = Session::new(
        base_config(base.join("keys")),
        runner.clone(),
        MemoryClipboard::new(),
    )
    .unwrap_or_else(|err| panic!("session should build: {err}"));
    let key_paths = session.key_paths().clone();

    SessionContext {
        world: Rc::new(RefCell::new(World {
            runner,
            session,
            key_paths,
            source,
            working_copy: None,
            staged: None,
            published: None,
            error: None,
            teardown: None,
            _tmp: tmp,
        })),
    }
}

/// Splits a comma-separated step argument.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

//! BDD step definitions for the session workflow.

use gitzilla::{PublishResult, SessionError, StageError, StagingRequest};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{SessionContext, split_list};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message()))
    }
}

#[given("a fresh session")]
fn fresh_session(session_context: &SessionContext) {
    let _ = session_context;
}

#[given("a session with a generated key")]
fn session_with_key(session_context: &SessionContext) -> Result<(), StepError> {
    let mut world = session_context.world();
    world.runner.push_keygen_success();
    world
        .session
        .generate_keypair()
        .map(|_| ())
        .map_err(|err| StepError::Assertion(format!("keygen should succeed: {err}")))
}

#[given("the remote repository contains folders \"{folders}\"")]
fn remote_with_folders(session_context: &SessionContext, folders: String) {
    let names = split_list(&folders);
    let borrowed: Vec<&str> = names.iter().map(String::as_str).collect();
    session_context.world().runner.push_clone_success(&borrowed);
}

#[given("the remote repository is empty")]
fn remote_empty(session_context: &SessionContext) {
    session_context.world().runner.push_clone_success(&[]);
}

#[given("the clone fails with \"{stderr}\"")]
fn clone_fails(session_context: &SessionContext, stderr: String) {
    session_context.world().runner.push_failure(128, stderr);
}

#[given("git accepts the commit and push")]
fn git_accepts(session_context: &SessionContext) {
    let world = session_context.world();
    world.runner.push_success(); // add
    world
        .runner
        .push_output(Some(0), "[main 1a2b3c4] Add file via Gitzilla\n", "");
    world.runner.push_success(); // push
}

#[given("git reports nothing to commit")]
fn git_nothing_to_commit(session_context: &SessionContext) {
    let world = session_context.world();
    world.runner.push_success(); // add
    world.runner.push_output(
        Some(1),
        "On branch main\nnothing to commit, working tree clean\n",
        "",
    );
}

#[when("I connect to \"{account}\" \"{repo}\"")]
fn connect(session_context: &SessionContext, account: String, repo: String) {
    let mut world = session_context.world();
    let connected = world
        .session
        .connect(&account, &repo)
        .map(|copy| copy.root().to_path_buf());
    match connected {
        Ok(root) => world.working_copy = Some(root),
        Err(err) => world.error = Some(err),
    }
}

fn stage_request(session_context: &SessionContext, request: &StagingRequest) {
    let mut world = session_context.world();
    match world.session.stage(request) {
        Ok(staged) => world.staged = Some(staged.relative),
        Err(err) => world.error = Some(err),
    }
}

#[when("I stage the upload into folder \"{folder}\" under \"{path}\"")]
fn stage_into_folder(session_context: &SessionContext, folder: String, path: String) {
    let source = session_context.world().source.clone();
    let request = StagingRequest::new(source)
        .subfolder(folder)
        .relative_path(path);
    stage_request(session_context, &request);
}

#[when("I stage the upload into the root under \"{path}\"")]
fn stage_into_root(session_context: &SessionContext, path: String) {
    let source = session_context.world().source.clone();
    let request = StagingRequest::new(source).relative_path(path);
    stage_request(session_context, &request);
}

#[when("I publish")]
fn publish(session_context: &SessionContext) {
    let mut world = session_context.world();
    match world.session.publish(|_| {}) {
        Ok(result) => world.published = Some(result),
        Err(err) => world.error = Some(err),
    }
}

#[when("the working copy is deleted externally")]
fn delete_working_copy(session_context: &SessionContext) -> Result<(), StepError> {
    let world = session_context.world();
    let root = world
        .working_copy
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("no working copy to delete")))?;
    std::fs::remove_dir_all(root)
        .map_err(|err| StepError::Assertion(format!("remove {root}: {err}")))
}

#[when("I tear down the session")]
fn tear_down(session_context: &SessionContext) {
    let mut world = session_context.world();
    let report = world.session.teardown();
    world.teardown = Some(report);
}

#[then("the folders offered are \"{folders}\"")]
fn folders_offered(session_context: &SessionContext, folders: String) -> Result<(), StepError> {
    let world = session_context.world();
    let copy = world
        .session
        .working_copy()
        .ok_or_else(|| StepError::Assertion(String::from("expected a working copy")))?;
    let offered = copy.folders().entries().join(",");
    let expected = split_list(&folders).join(",");
    ensure(offered == expected, || {
        format!("expected folders {expected}, got {offered}")
    })
}

#[then("the staged file is at \"{relative}\"")]
fn staged_at(session_context: &SessionContext, relative: String) -> Result<(), StepError> {
    let world = session_context.world();
    let staged = world
        .staged
        .as_ref()
        .ok_or_else(|| StepError::Assertion(format!("nothing staged: {:?}", world.error)))?;
    ensure(staged.as_str() == relative, || {
        format!("expected {relative}, got {staged}")
    })?;
    let root = world
        .working_copy
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("expected a working copy")))?;
    ensure(root.join(staged).is_file(), || {
        format!("{staged} should exist in {root}")
    })
}

#[then("the publish result is \"{result}\"")]
fn publish_result(session_context: &SessionContext, result: String) -> Result<(), StepError> {
    let expected = match result.as_str() {
        "success" => PublishResult::Success,
        "no changes" => PublishResult::NoChanges,
        other => {
            return Err(StepError::Assertion(format!(
                "unknown publish result {other}"
            )));
        }
    };
    let world = session_context.world();
    ensure(world.published == Some(expected), || {
        format!(
            "expected {expected:?}, got {:?} (error: {:?})",
            world.published, world.error
        )
    })
}

#[then("git ran \"{commands}\" in the working copy")]
fn git_ran(session_context: &SessionContext, commands: String) -> Result<(), StepError> {
    let world = session_context.world();
    let root = world
        .working_copy
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("expected a working copy")))?;
    let publish_calls: Vec<_> = world
        .runner
        .invocations()
        .into_iter()
        .filter(|call| call.program == "git" && call.current_dir.is_some())
        .collect();
    let ran: Vec<String> = publish_calls
        .iter()
        .filter_map(|call| call.args.first())
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    ensure(ran == split_list(&commands), || {
        format!("expected git {commands}, got {ran:?}")
    })?;
    ensure(
        publish_calls
            .iter()
            .all(|call| call.current_dir.as_ref() == Some(root)),
        || format!("every publish step should run in {root}"),
    )
}

#[then("the session error is \"{kind}\"")]
fn session_error(session_context: &SessionContext, kind: String) -> Result<(), StepError> {
    let world = session_context.world();
    let error = world
        .error
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("expected an error")))?;
    let matched = match kind.as_str() {
        "no key" => matches!(error, SessionError::NoKey),
        "clone" => matches!(error, SessionError::Clone(_)),
        "outside working copy" => matches!(
            error,
            SessionError::Stage(StageError::OutsideWorkingCopy { .. })
        ),
        other => {
            return Err(StepError::Assertion(format!("unknown error kind {other}")));
        }
    };
    ensure(matched, || format!("expected {kind} error, got {error}"))
}

#[then("no external command ran")]
fn no_commands(session_context: &SessionContext) -> Result<(), StepError> {
    let invocations = session_context.world().runner.invocations();
    ensure(invocations.is_empty(), || {
        format!("unexpected invocations: {invocations:?}")
    })
}

#[then("there is no working copy")]
fn no_working_copy(session_context: &SessionContext) -> Result<(), StepError> {
    let world = session_context.world();
    ensure(world.session.working_copy().is_none(), || {
        String::from("working copy should be absent")
    })
}

#[then("teardown reported no failures")]
fn teardown_clean(session_context: &SessionContext) -> Result<(), StepError> {
    let world = session_context.world();
    let report = world
        .teardown
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("teardown did not run")))?;
    ensure(report.is_clean(), || {
        format!("teardown failures: {:?}", report.failures)
    })
}

#[then("the key files are removed")]
fn keys_removed(session_context: &SessionContext) -> Result<(), StepError> {
    let world = session_context.world();
    ensure(!world.key_paths.any_exist(), || {
        format!("key files remain at {}", world.key_paths.private_key)
    })
}

//! BDD scenarios for the session workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{SessionContext, session_context};

#[scenario(
    path = "tests/features/session.feature",
    name = "Upload a file into a nested folder"
)]
fn scenario_upload_nested(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Empty repository shows the no-folders placeholder"
)]
fn scenario_empty_repository(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Nothing to commit skips the push"
)]
fn scenario_nothing_to_commit(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Connecting without a key is refused"
)]
fn scenario_no_key(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Clone failure leaves no working copy"
)]
fn scenario_clone_failure(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Staging outside the repository is rejected"
)]
fn scenario_outside_working_copy(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Teardown after the working copy vanished still removes keys"
)]
fn scenario_teardown_after_external_delete(session_context: SessionContext) {
    let _ = session_context;
}

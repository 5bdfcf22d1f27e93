//! Unit tests for the key manager.

use super::*;
use crate::test_support::{FAKE_PUBLIC_KEY, ScriptedRunner, utf8};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct KeyFixture {
    _tmp: TempDir,
    paths: KeyPaths,
    runner: ScriptedRunner,
}

impl KeyFixture {
    fn manager(&self) -> KeyManager<ScriptedRunner> {
        KeyManager::new(
            self.paths.clone(),
            "ssh-keygen",
            "gitzilla_key",
            self.runner.clone(),
        )
    }
}

#[fixture]
fn keys() -> KeyFixture {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let dir = utf8(tmp.path()).join("keys");
    KeyFixture {
        paths: KeyPaths::new(&dir, "id_rsa_gitzilla"),
        runner: ScriptedRunner::new(),
        _tmp: tmp,
    }
}

fn arg_strings(spec: &CommandSpec) -> Vec<String> {
    spec.args
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn key_paths_append_pub_suffix() {
    let paths = KeyPaths::new(Utf8Path::new("/home/a/.gitzilla_keys"), "id_rsa_gitzilla");
    assert_eq!(
        paths.private_key,
        Utf8PathBuf::from("/home/a/.gitzilla_keys/id_rsa_gitzilla")
    );
    assert_eq!(
        paths.public_key,
        Utf8PathBuf::from("/home/a/.gitzilla_keys/id_rsa_gitzilla.pub")
    );
    assert_eq!(paths.dir(), Utf8Path::new("/home/a/.gitzilla_keys"));
}

#[rstest]
fn generate_invokes_ssh_keygen_with_fixed_parameters(keys: KeyFixture) {
    keys.runner.push_keygen_success();

    keys.manager().generate().expect("generation should succeed");

    let invocations = keys.runner.invocations();
    assert_eq!(invocations.len(), 1);
    let call = invocations.first().expect("one invocation");
    assert_eq!(call.program, "ssh-keygen");
    assert_eq!(
        arg_strings(call),
        vec![
            "-t".to_owned(),
            "rsa".to_owned(),
            "-b".to_owned(),
            "4096".to_owned(),
            "-C".to_owned(),
            "gitzilla_key".to_owned(),
            "-f".to_owned(),
            keys.paths.private_key.to_string(),
            "-N".to_owned(),
            String::new(),
        ]
    );
}

#[rstest]
fn generate_reads_back_trimmed_public_key(keys: KeyFixture) {
    keys.runner.push_keygen_success();

    let keypair = keys.manager().generate().expect("generation should succeed");

    assert_eq!(keypair.public_key(), FAKE_PUBLIC_KEY);
    assert_eq!(keypair.private_key_path(), keys.paths.private_key);
    assert_eq!(keypair.public_key_path(), keys.paths.public_key);
}

#[rstest]
fn generate_deletes_previous_keys_before_running(keys: KeyFixture) {
    fs_write(&keys.paths.private_key, "stale private");
    fs_write(&keys.paths.public_key, "stale public");
    let observed = std::rc::Rc::new(std::cell::Cell::new(true));
    let seen = std::rc::Rc::clone(&observed);
    let private = keys.paths.private_key.clone();
    let public = keys.paths.public_key.clone();
    keys.runner.push_success_with(move |_| {
        seen.set(private.exists() || public.exists());
    });

    let err = keys
        .manager()
        .generate()
        .expect_err("scripted keygen writes no public key");

    assert!(!observed.get(), "stale keys should be gone before ssh-keygen runs");
    assert!(matches!(err, KeyError::ReadPublicKey { .. }), "unexpected: {err}");
}

#[rstest]
fn repeated_generation_leaves_one_keypair(keys: KeyFixture) {
    let manager = keys.manager();
    for _ in 0..3 {
        keys.runner.push_keygen_success();
        manager.generate().expect("generation should succeed");
        let files = std::fs::read_dir(keys.paths.dir())
            .expect("key dir readable")
            .count();
        assert_eq!(files, 2, "exactly one private and one public key");
    }
}

#[rstest]
fn generate_surfaces_keygen_stderr(keys: KeyFixture) {
    keys.runner
        .push_failure(1, "Saving key failed: Permission denied\n");

    let err = keys.manager().generate().expect_err("keygen should fail");

    let KeyError::Generation {
        ref status_text,
        ref stderr,
    } = err
    else {
        panic!("expected Generation error, got {err:?}");
    };
    assert_eq!(status_text, "1");
    assert_eq!(stderr, "Saving key failed: Permission denied");
}

#[rstest]
fn generate_propagates_timeouts(keys: KeyFixture) {
    keys.runner.push_error(ProcessError::Timeout {
        program: String::from("ssh-keygen"),
        timeout_secs: 5,
    });

    let err = keys.manager().generate().expect_err("keygen should time out");

    assert!(
        matches!(err, KeyError::Process(ProcessError::Timeout { .. })),
        "unexpected: {err}"
    );
}

#[rstest]
fn load_existing_requires_private_key(keys: KeyFixture) {
    let err = keys
        .manager()
        .load_existing()
        .expect_err("no key generated yet");
    assert!(matches!(err, KeyError::Missing { .. }), "unexpected: {err}");
}

#[rstest]
fn load_existing_returns_generated_keypair(keys: KeyFixture) {
    keys.runner.push_keygen_success();
    let generated = keys.manager().generate().expect("generation should succeed");

    let loaded = keys.manager().load_existing().expect("key should load");

    assert_eq!(loaded, generated);
    assert_eq!(keys.runner.pending(), 0);
}

#[rstest]
fn remove_tolerates_missing_files(keys: KeyFixture) {
    assert!(keys.paths.remove().is_ok());
    fs_write(&keys.paths.public_key, "only public");
    keys.paths.remove().expect("public key should be removed");
    assert!(!keys.paths.any_exist());
}

#[test]
fn snippet_shows_first_thirty_characters() {
    let keypair = Keypair {
        paths: KeyPaths::new(Utf8Path::new("/k"), "id"),
        public_key: String::from(FAKE_PUBLIC_KEY),
    };
    let snippet = keypair.snippet();
    assert_eq!(snippet, format!("{}...", FAKE_PUBLIC_KEY.get(..30).expect("ascii key")));
}

fn fs_write(path: &Utf8Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|err| panic!("create parent directories for {path}: {err}"));
    }
    std::fs::write(path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
}

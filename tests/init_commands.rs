use crate::common::command::{read_head, repository_dir, run_mygit_command};
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

#[rstest]
fn init_creates_the_repository_layout(repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let git_dir = repository_dir.path().canonicalize()?.join(".mygit");

    run_mygit_command(repository_dir.path(), &["init"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "Initialized empty mygit repository in ",
        ))
        .stdout(predicate::str::contains(git_dir.display().to_string()));

    repository_dir.child(".mygit/objects").assert(predicate::path::is_dir());
    repository_dir.child(".mygit/refs/heads").assert(predicate::path::is_dir());
    assert_eq!(read_head(repository_dir.path()), "ref: refs/heads/master");

    Ok(())
}

#[rstest]
fn init_with_an_initial_branch(repository_dir: TempDir) {
    run_mygit_command(repository_dir.path(), &["init", "-b", "main"])
        .assert()
        .success();

    assert_eq!(read_head(repository_dir.path()), "ref: refs/heads/main");
    // the branch is recorded but unborn until the first commit
    repository_dir.child(".mygit/refs/heads/main").assert("\n");
    repository_dir
        .child(".mygit/refs/heads/master")
        .assert(predicate::path::missing());
}

#[rstest]
fn init_at_a_path_creates_missing_directories(repository_dir: TempDir) {
    run_mygit_command(repository_dir.path(), &["init", "-p", "nested/repo"])
        .assert()
        .success();

    repository_dir
        .child("nested/repo/.mygit/HEAD")
        .assert(predicate::path::is_file());
}

#[rstest]
fn init_twice_fails_and_keeps_the_repository(repository_dir: TempDir) {
    run_mygit_command(repository_dir.path(), &["init", "-b", "main"])
        .assert()
        .success();

    run_mygit_command(repository_dir.path(), &["init"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("error[RepoAlreadyExists]"));

    assert_eq!(read_head(repository_dir.path()), "ref: refs/heads/main");
}

#[rstest]
fn init_rejects_an_invalid_branch_name(repository_dir: TempDir) {
    run_mygit_command(repository_dir.path(), &["init", "-b", "bad..name"])
        .assert()
        .code(23)
        .stderr(predicate::str::contains("error[InvalidRefName]"));

    repository_dir.child(".mygit").assert(predicate::path::missing());
}

#[rstest]
#[case(&["status"])]
#[case(&["add", "."])]
#[case(&["log"])]
#[case(&["branch"])]
#[case(&["commit", "-m", "message"])]
fn commands_outside_a_repository_fail(repository_dir: TempDir, #[case] args: &[&str]) {
    run_mygit_command(repository_dir.path(), args)
        .assert()
        .code(11)
        .stderr(predicate::str::contains("error[RepoNotFound]"));

    repository_dir.child(".mygit").assert(predicate::path::missing());
}

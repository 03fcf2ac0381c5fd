use crate::common::command::{init_repository_dir, run_mygit_command};
use crate::common::file::{FileSpec, write_file};
use assert_fs::TempDir;
use mygit::areas::lock::RepositoryLock;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

#[rstest]
fn writers_fail_fast_while_the_repository_is_locked(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    write_file(FileSpec::new(dir.join("new.txt"), "new".to_string()));

    let lock = RepositoryLock::acquire(&dir.join(".mygit"))?;

    run_mygit_command(dir, &["add", "new.txt"])
        .assert()
        .code(21)
        .stderr(predicate::str::contains("error[RepositoryLocked]"));
    run_mygit_command(dir, &["branch", "topic"])
        .assert()
        .code(21);

    // readers do not take the lock
    run_mygit_command(dir, &["log", "--oneline"])
        .assert()
        .success();

    drop(lock);

    run_mygit_command(dir, &["add", "new.txt"])
        .assert()
        .success();
    run_mygit_command(dir, &["status", "--porcelain"])
        .assert()
        .success()
        .stdout("A  new.txt\n");

    Ok(())
}

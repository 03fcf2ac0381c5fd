use crate::common::command::{
    commit_all, get_head_commit_sha, init_repository_dir, read_branch, repository_dir,
    repository_with_multiple_commits, run_mygit_command, stdout_of,
};
use crate::common::file::{FileSpec, write_file};
use assert_fs::TempDir;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

#[rstest]
fn branch_points_at_head(init_repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    run_mygit_command(init_repository_dir.path(), &["branch", "feature"])
        .assert()
        .success();

    assert_eq!(
        read_branch(init_repository_dir.path(), "feature"),
        Some(get_head_commit_sha(init_repository_dir.path())?)
    );

    Ok(())
}

#[rstest]
fn branch_lists_all_branches_marking_the_current_one(init_repository_dir: TempDir) {
    for name in ["topic", "feature/login", "alpha"] {
        run_mygit_command(init_repository_dir.path(), &["branch", name])
            .assert()
            .success();
    }

    let listing = stdout_of(&mut run_mygit_command(init_repository_dir.path(), &["branch"]));

    assert_eq!(
        listing,
        "  alpha\n  feature/login\n* master\n  topic\n"
    );
}

#[rstest]
fn branch_from_a_start_point(repository_with_multiple_commits: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_multiple_commits.path();
    let log = stdout_of(&mut run_mygit_command(dir, &["log", "--oneline"]));
    let first_short = log.lines().last().unwrap().split(' ').next().unwrap().to_string();

    run_mygit_command(dir, &["branch", "old", "master"])
        .assert()
        .success();
    assert_eq!(read_branch(dir, "old"), Some(get_head_commit_sha(dir)?));

    // a full id works as a start point, an abbreviated one does not
    run_mygit_command(dir, &["branch", "older", &first_short])
        .assert()
        .code(12)
        .stderr(predicate::str::contains("error[RefNotFound]"));

    Ok(())
}

#[rstest]
fn branch_from_an_unknown_start_point_fails(init_repository_dir: TempDir) {
    run_mygit_command(init_repository_dir.path(), &["branch", "topic", "nowhere"])
        .assert()
        .code(12)
        .stderr(predicate::str::contains("error[RefNotFound]"));

    assert_eq!(read_branch(init_repository_dir.path(), "topic"), None);
}

#[rstest]
fn duplicate_branch_is_rejected(init_repository_dir: TempDir) {
    run_mygit_command(init_repository_dir.path(), &["branch", "topic"])
        .assert()
        .success();

    run_mygit_command(init_repository_dir.path(), &["branch", "topic"])
        .assert()
        .code(13)
        .stderr(predicate::str::contains("error[RefAlreadyExists]"));
}

#[rstest]
#[case("bad..name")]
#[case("/leading")]
#[case("trailing/")]
#[case("with space")]
#[case("name.lock")]
#[case("HEAD")]
fn invalid_branch_names_are_rejected(init_repository_dir: TempDir, #[case] name: &str) {
    run_mygit_command(init_repository_dir.path(), &["branch", name])
        .assert()
        .code(23)
        .stderr(predicate::str::contains("error[InvalidRefName]"));
}

#[rstest]
fn branch_on_an_unborn_head_is_recorded_unborn(repository_dir: TempDir) {
    let dir = repository_dir.path();
    run_mygit_command(dir, &["init"]).assert().success();

    run_mygit_command(dir, &["branch", "topic"]).assert().success();

    assert!(dir.join(".mygit/refs/heads/topic").is_file());
    assert_eq!(read_branch(dir, "topic"), None);
    assert_eq!(
        stdout_of(&mut run_mygit_command(dir, &["branch"])),
        "* master\n  topic\n"
    );

    run_mygit_command(dir, &["branch", "topic"])
        .assert()
        .code(13)
        .stderr(predicate::str::contains("error[RefAlreadyExists]"));
}

#[rstest]
fn branch_from_an_explicit_unborn_head_fails(repository_dir: TempDir) {
    run_mygit_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    run_mygit_command(repository_dir.path(), &["branch", "topic", "HEAD"])
        .assert()
        .code(14)
        .stderr(predicate::str::contains("error[UnbornHead]"));
    assert!(!repository_dir.path().join(".mygit/refs/heads/topic").exists());
}

#[rstest]
fn deleting_a_branch(init_repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let head = get_head_commit_sha(init_repository_dir.path())?;
    run_mygit_command(init_repository_dir.path(), &["branch", "topic"])
        .assert()
        .success();

    run_mygit_command(init_repository_dir.path(), &["branch", "-d", "topic"])
        .assert()
        .success()
        .stdout(format!("Deleted branch topic (was {}).\n", &head[..7]));

    assert_eq!(read_branch(init_repository_dir.path(), "topic"), None);

    Ok(())
}

#[rstest]
fn deleting_an_unmerged_branch_is_refused(init_repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    run_mygit_command(dir, &["checkout", "-b", "topic"])
        .assert()
        .success();
    write_file(FileSpec::new(dir.join("topic.txt"), "topic".to_string()));
    commit_all(dir, "Topic only");
    let topic = get_head_commit_sha(dir)?;
    run_mygit_command(dir, &["checkout", "master"])
        .assert()
        .success();

    run_mygit_command(dir, &["branch", "-d", "topic"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not fully merged"));
    assert_eq!(read_branch(dir, "topic"), Some(topic));

    // once master contains it the branch can go
    run_mygit_command(dir, &["merge", "topic"]).assert().success();
    run_mygit_command(dir, &["branch", "-d", "topic"])
        .assert()
        .success();
    assert_eq!(read_branch(dir, "topic"), None);

    Ok(())
}

#[rstest]
fn deleting_an_unborn_branch(repository_dir: TempDir) {
    let dir = repository_dir.path();
    run_mygit_command(dir, &["init"]).assert().success();
    run_mygit_command(dir, &["branch", "topic"]).assert().success();

    run_mygit_command(dir, &["branch", "-d", "topic"])
        .assert()
        .success()
        .stdout("Deleted branch topic (was unborn).\n");
    assert!(!dir.join(".mygit/refs/heads/topic").exists());
}

#[rstest]
fn deleting_the_current_branch_is_refused(init_repository_dir: TempDir) {
    run_mygit_command(init_repository_dir.path(), &["branch", "-d", "master"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("checked out"));

    assert!(read_branch(init_repository_dir.path(), "master").is_some());
}

#[rstest]
fn deleting_a_missing_branch_fails(init_repository_dir: TempDir) {
    run_mygit_command(init_repository_dir.path(), &["branch", "-d", "ghost"])
        .assert()
        .code(12);
}

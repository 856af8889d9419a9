use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const STUDENT: &str = "11111111-1111-4111-8111-111111111111";
const WRITER: &str = "22222222-2222-4222-8222-222222222222";
const ASGN_A: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";
const ASGN_B: &str = "bbbbbbbb-bbbb-4bbb-8bbb-bbbbbbbbbbbb";

fn seed_lines(file: &mut NamedTempFile) {
    writeln!(
        file,
        r#"{{"op": "seed_user", "id": "{STUDENT}", "name": "Sam Student", "role": "STUDENT"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"op": "seed_user", "id": "{WRITER}", "name": "Wren Writer", "role": "WRITER"}}"#
    )
    .unwrap();
}

fn create_and_capture(file: &mut NamedTempFile, assignment: &str) {
    writeln!(
        file,
        r#"{{"op": "create", "id": "{assignment}", "student_id": "{STUDENT}", "title": "Essay", "description": "Four pages", "subject": "History", "budget": 100.0, "deadline": "2030-01-01T00:00:00Z", "pages": 4}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"op": "capture_payment", "assignment_id": "{assignment}"}}"#
    )
    .unwrap();
}

fn full_flow(file: &mut NamedTempFile) {
    seed_lines(file);
    create_and_capture(file, ASGN_A);
    writeln!(
        file,
        r#"{{"op": "submit_quote", "assignment_id": "{ASGN_A}", "writer_id": "{WRITER}", "amount": 100.0, "comment": "on it"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"op": "respond_quote", "assignment_id": "{ASGN_A}", "student_id": "{STUDENT}", "action": "ACCEPT"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"op": "update_status", "assignment_id": "{ASGN_A}", "actor_id": "{WRITER}", "new_status": "IN_PROGRESS"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"op": "submit_work", "assignment_id": "{ASGN_A}", "writer_id": "{WRITER}", "text": "final draft"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"op": "update_status", "assignment_id": "{ASGN_A}", "actor_id": "{STUDENT}", "new_status": "COMPLETED"}}"#
    )
    .unwrap();
}

#[test]
fn test_full_flow_prints_deposit_and_payout() {
    let mut file = NamedTempFile::new().unwrap();
    full_flow(&mut file);

    let mut cmd = Command::new(cargo_bin!("paperdesk"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "id,assignment,kind,amount,status,timestamp",
        ))
        .stdout(predicate::str::contains("PAYMENT,100,SUCCESS"))
        .stdout(predicate::str::contains("PAYOUT,85,SUCCESS"));
}

#[test]
fn test_fee_rate_flag_changes_payout() {
    let mut file = NamedTempFile::new().unwrap();
    full_flow(&mut file);

    let mut cmd = Command::new(cargo_bin!("paperdesk"));
    cmd.arg(file.path()).arg("--fee-rate").arg("0.10");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("PAYOUT,90,SUCCESS"));
}

#[test]
fn test_ledger_report_filters_by_assignment() {
    let mut file = NamedTempFile::new().unwrap();
    seed_lines(&mut file);
    create_and_capture(&mut file, ASGN_A);
    create_and_capture(&mut file, ASGN_B);

    let mut cmd = Command::new(cargo_bin!("paperdesk"));
    cmd.arg(file.path()).arg("--assignment").arg(ASGN_A);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(ASGN_A))
        .stdout(predicate::str::contains(ASGN_B).not());
}

#[test]
fn test_rejected_requests_do_not_abort_the_run() {
    let mut file = NamedTempFile::new().unwrap();
    seed_lines(&mut file);
    create_and_capture(&mut file, ASGN_A);
    // Unknown operation
    writeln!(file, r#"{{"op": "escalate", "assignment_id": "{ASGN_A}"}}"#).unwrap();
    // Guard failure: duplicate capture
    writeln!(
        file,
        r#"{{"op": "capture_payment", "assignment_id": "{ASGN_A}"}}"#
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("paperdesk"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("PAYMENT,100,SUCCESS"))
        .stderr(predicate::str::contains("Error reading request"))
        .stderr(predicate::str::contains("already settled"));
}

#[test]
fn test_revision_after_completion_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    full_flow(&mut file);
    // Already completed; a revision request now is a guard failure
    writeln!(
        file,
        r#"{{"op": "update_status", "assignment_id": "{ASGN_A}", "actor_id": "{STUDENT}", "new_status": "REVISION", "feedback": "one more pass"}}"#
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("paperdesk"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("invalid transition"));
}

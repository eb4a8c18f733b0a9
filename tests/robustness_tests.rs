use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_malformed_csv_handling() {
    let file = NamedTempFile::new().unwrap();
    let mut wtr = csv::Writer::from_path(file.path()).unwrap();
    wtr.write_record(["op", "member", "target", "detail", "amount"])
        .unwrap();

    // Valid credit
    wtr.write_record(["credit", "3", "self", "", "1.0"]).unwrap();
    // Unknown operation
    wtr.write_record(["refund", "3", "", "", "1.0"]).unwrap();
    // Credit without amount
    wtr.write_record(["credit", "3", "self", "", ""]).unwrap();
    // Unknown wallet
    wtr.write_record(["credit", "3", "savings", "", "5"]).unwrap();
    // Unknown member
    wtr.write_record(["credit", "99", "self", "", "5"]).unwrap();
    // Negative amount
    wtr.write_record(["credit", "3", "task", "", "-2"]).unwrap();
    // Valid credit again
    wtr.write_record(["credit", "3", "self", "", "2.0"]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("referral-ledger"));
    cmd.arg(file.path())
        .arg("--seed")
        .arg("tests/fixtures/seed.json");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stderr(predicate::str::contains("Invalid amount"))
        .stderr(predicate::str::contains("Not found: member 99"))
        .stdout(predicate::str::contains("3,GL000003,inactive,3,0,0,0,3,2,0")); // 1.0 + 2.0 = 3.0
}

#[test]
fn test_unknown_payment_request_is_reported() {
    let file = NamedTempFile::new().unwrap();
    let mut wtr = csv::Writer::from_path(file.path()).unwrap();
    wtr.write_record(["op", "member", "target", "detail", "amount"])
        .unwrap();
    wtr.write_record(["resolve", "1", "42", "accept", ""]).unwrap();
    wtr.write_record(["resolve", "1", "", "accept", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("referral-ledger"));
    cmd.arg(file.path())
        .arg("--seed")
        .arg("tests/fixtures/seed.json");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Not found: payment request 42"))
        .stderr(predicate::str::contains("missing payment id"));
}

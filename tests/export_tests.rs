//! End-to-end extraction tests over in-memory archives and the mbox store fixture.

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use chrono::{TimeZone, Utc};
use predicates::prelude::*;

use mailextract::archive::memory::{MemoryArchive, MemoryFolder};
use mailextract::archive::{RawAttachment, RawMessage, RawText};
use mailextract::error::ExtractError;
use mailextract::export::{ExportOptions, Exporter, RunReport, RunStatus};
use mailextract::normalize::Degradation;
use mailextract::write::OutputFormat;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn status_mail(id: &str, hour: u32) -> RawMessage {
    RawMessage {
        id: id.into(),
        subject: Some(RawText::utf8("Status")),
        sent_time: Some(Utc.with_ymd_and_hms(2024, 3, 15, hour, 0, 0).unwrap()),
        plain_body: Some(RawText::utf8(format!("update {id}"))),
        ..RawMessage::default()
    }
}

fn run(archive: &MemoryArchive, options: ExportOptions) -> RunReport {
    Exporter::new(options).run_archive(archive, &|_| {}).unwrap()
}

fn relative(report: &RunReport, root: &Path) -> Vec<String> {
    report
        .outputs
        .iter()
        .map(|p| {
            p.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

// ─── Test 1: Same subject and date in one folder → bare name, then (2) ──

#[test]
fn test_scenario_duplicate_subjects() {
    let out = assert_fs::TempDir::new().unwrap();
    let archive = MemoryArchive::new(
        "a.pst",
        MemoryFolder::new("root").with_folder(
            MemoryFolder::new("Inbox")
                .with_message(status_mail("1", 9))
                .with_message(status_mail("2", 14)),
        ),
    );

    let report = run(&archive, ExportOptions::new(out.path(), OutputFormat::Eml));

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.processed, 2);
    out.child("Inbox/[2024-03-15] - Status.eml")
        .assert(predicate::str::contains("update 1"));
    out.child("Inbox/[2024-03-15] - Status (2).eml")
        .assert(predicate::str::contains("update 2"));
}

// ─── Test 2: No subject, no date, both formats, one attachment ─────────

#[test]
fn test_scenario_undated_untitled_with_attachment() {
    let out = assert_fs::TempDir::new().unwrap();
    let payload: Vec<u8> = (0..=255u8).rev().collect();
    let message = RawMessage {
        id: "x".into(),
        plain_body: Some(RawText::utf8("no metadata at all")),
        attachments: vec![RawAttachment {
            filename: Some("scan.jpg".into()),
            content_type: Some("image/jpeg".into()),
            declared_size: Some(256),
            data: payload.clone(),
        }],
        ..RawMessage::default()
    };
    let archive = MemoryArchive::new(
        "b.pst",
        MemoryFolder::new("root").with_folder(MemoryFolder::new("Inbox").with_message(message)),
    );

    let report = run(&archive, ExportOptions::new(out.path(), OutputFormat::Both));

    assert_eq!(
        relative(&report, out.path()),
        vec![
            "Inbox/[unknown date] - No Subject.eml",
            "Inbox/[unknown date] - No Subject.pdf",
            "Inbox/attachments/scan.jpg",
        ]
    );
    assert_eq!(report.attachments_written, 1);
    out.child("Inbox/[unknown date] - No Subject.pdf")
        .assert(predicate::path::is_file());
    let written = std::fs::read(out.child("Inbox/attachments/scan.jpg").path()).unwrap();
    assert_eq!(written, payload);

    let notes = &report.degraded[0].notes;
    assert!(notes.contains(&Degradation::UnknownDate));
    assert!(notes.contains(&Degradation::MissingSubject));
}

// ─── Test 3: Signature failure is fatal and creates nothing ────────────

#[test]
fn test_scenario_unrecognized_archive() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let bogus = tmp.child("backup.pst");
    bogus.write_binary(b"\x00\x01garbage that is not mail").unwrap();
    let out = tmp.child("out");

    let err = Exporter::new(ExportOptions::new(out.path(), OutputFormat::Eml))
        .run(bogus.path())
        .unwrap_err();

    assert!(matches!(err, ExtractError::UnrecognizedArchive(_)));
    out.assert(predicate::path::missing());
}

// ─── Test 4: Undeclared legacy body encoding is degraded, not failed ───

#[test]
fn test_scenario_legacy_encoding() {
    let out = assert_fs::TempDir::new().unwrap();
    let text = "Les élèves ont déjà reçu le télégramme à côté de la fenêtre.";
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(text);
    let message = RawMessage {
        id: "legacy".into(),
        subject: Some(RawText::utf8("Télégramme")),
        sent_time: Some(Utc.with_ymd_and_hms(2019, 6, 1, 8, 0, 0).unwrap()),
        plain_body: Some(RawText::undeclared(bytes.into_owned())),
        ..RawMessage::default()
    };
    let archive = MemoryArchive::new(
        "d.pst",
        MemoryFolder::new("root").with_folder(MemoryFolder::new("Old").with_message(message)),
    );

    let report = run(&archive, ExportOptions::new(out.path(), OutputFormat::Eml));

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.failed, 0);
    assert!(report.degraded[0]
        .notes
        .iter()
        .any(|n| matches!(n, Degradation::DetectedEncoding { field: "body", .. })));

    let eml = std::fs::read(out.child("Old/[2019-06-01] - Télégramme.eml").path()).unwrap();
    let parsed = mail_parser::MessageParser::default().parse(&eml).unwrap();
    assert_eq!(parsed.body_text(0).unwrap().trim(), text);
}

// ─── Test 5: Preview plans the same paths and writes nothing ──────────

#[test]
fn test_preview_matches_real_run() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let archive = MemoryArchive::new(
        "p.pst",
        MemoryFolder::new("root").with_folder(
            MemoryFolder::new("Inbox")
                .with_message(status_mail("1", 9))
                .with_message(status_mail("2", 10))
                .with_folder(MemoryFolder::new("Inbox").with_message(status_mail("3", 11))),
        ),
    );

    let root = tmp.child("out");
    let mut preview = ExportOptions::new(root.path(), OutputFormat::Both);
    preview.preview = true;
    let planned = run(&archive, preview);
    root.assert(predicate::path::missing());

    let written = run(&archive, ExportOptions::new(root.path(), OutputFormat::Both));
    assert_eq!(planned.outputs, written.outputs);
    assert!(written.outputs.iter().all(|p| p.is_file()));
}

// ─── Test 6: Re-running into the same root never overwrites ───────────

#[test]
fn test_second_run_suffixes_instead_of_overwriting() {
    let out = assert_fs::TempDir::new().unwrap();
    let archive = MemoryArchive::new(
        "r.pst",
        MemoryFolder::new("root")
            .with_folder(MemoryFolder::new("Inbox").with_message(status_mail("1", 9))),
    );

    run(&archive, ExportOptions::new(out.path(), OutputFormat::Eml));
    let second = run(&archive, ExportOptions::new(out.path(), OutputFormat::Eml));

    assert_eq!(
        relative(&second, out.path()),
        vec!["Inbox/[2024-03-15] - Status (2).eml"]
    );
    out.child("Inbox/[2024-03-15] - Status.eml")
        .assert(predicate::path::is_file());
}

// ─── Test 7: Sibling folders that sanitize alike stay apart ───────────

#[test]
fn test_colliding_folder_names() {
    let out = assert_fs::TempDir::new().unwrap();
    let archive = MemoryArchive::new(
        "f.pst",
        MemoryFolder::new("root")
            .with_folder(MemoryFolder::new("Q1: Plans").with_message(status_mail("1", 9)))
            .with_folder(MemoryFolder::new("Q1 Plans?").with_message(status_mail("2", 9)))
            .with_folder(MemoryFolder::new("attachments").with_message(status_mail("3", 9))),
    );

    let report = run(&archive, ExportOptions::new(out.path(), OutputFormat::Eml));

    assert_eq!(
        relative(&report, out.path()),
        vec![
            "Q1 Plans/[2024-03-15] - Status.eml",
            "Q1 Plans (2)/[2024-03-15] - Status.eml",
            "attachments (2)/[2024-03-15] - Status.eml",
        ]
    );
}

// ─── Test 8: Thunderbird-style store, nested folders and attachments ──

#[test]
fn test_mbox_store_fixture() {
    let out = assert_fs::TempDir::new().unwrap();
    let report = Exporter::new(ExportOptions::new(out.path(), OutputFormat::Eml))
        .run(&fixture("store/Inbox"))
        .unwrap();

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.processed, 4);
    assert_eq!(
        relative(&report, out.path()),
        vec![
            "Inbox/[2024-03-15] - Status.eml",
            "Inbox/[2024-03-15] - Status (2).eml",
            "Inbox/[2024-03-16] - Report attached.eml",
            "Inbox/attachments/notes.txt",
            "Inbox/Projects/[2024-04-01] - Kickoff.eml",
        ]
    );
    out.child("Inbox/attachments/notes.txt")
        .assert(predicate::str::diff("hello notes\n"));
    out.child("Inbox/[2024-03-15] - Status (2).eml")
        .assert(predicate::str::contains("carol@example.com"));
    out.child("Inbox/Projects.msf").assert(predicate::path::missing());
}

// ─── Test 9: JSON report carries counts and failures ──────────────────

#[test]
fn test_report_json() {
    let out = assert_fs::TempDir::new().unwrap();
    let archive = MemoryArchive::new(
        "j.pst",
        MemoryFolder::new("root").with_folder(
            MemoryFolder::new("Inbox")
                .with_message(status_mail("1", 9))
                .with_unreadable("7", "checksum mismatch"),
        ),
    );

    let report = run(&archive, ExportOptions::new(out.path(), OutputFormat::Eml));
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(report.status(), RunStatus::PartialFailure);
    assert_eq!(json["processed"], 1);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["failures"][0]["source"], "Inbox");
    assert!(json["failures"][0]["reason"]
        .as_str()
        .unwrap()
        .contains("checksum mismatch"));
}

// ─── Test 10: Quoted-printable legacy body without a charset ──────────

#[test]
fn test_quoted_printable_legacy_body_is_detected() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let store = tmp.child("Old");
    store
        .write_binary(
            b"From a@example.com Sat Jun  1 08:00:00 2019\n\
From: Archive <a@example.com>\n\
Subject: Telegramme\n\
Date: Sat, 1 Jun 2019 08:00:00 +0000\n\
MIME-Version: 1.0\n\
Content-Type: text/plain\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
Les =E9l=E8ves ont d=E9j=E0 re=E7u le t=E9l=E9gramme =\n\
=E0 c=F4t=E9 de la fen=EAtre.\n",
        )
        .unwrap();
    let out = tmp.child("out");

    let report = Exporter::new(ExportOptions::new(out.path(), OutputFormat::Eml))
        .run(store.path())
        .unwrap();

    assert_eq!(report.failed, 0);
    assert!(report.degraded[0]
        .notes
        .iter()
        .any(|n| matches!(n, Degradation::DetectedEncoding { field: "body", .. })));
    let eml = std::fs::read(out.child("Old/[2019-06-01] - Telegramme.eml").path()).unwrap();
    let parsed = mail_parser::MessageParser::default().parse(&eml).unwrap();
    assert_eq!(
        parsed.body_text(0).unwrap().trim(),
        "Les élèves ont déjà reçu le télégramme à côté de la fenêtre."
    );
}

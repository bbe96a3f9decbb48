use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use tempfile::TempDir;

use rs_mail_archive::domain::message::{
    FetchRequest, ListRequest, MessageId, MessagePage, RawMessage,
};
use rs_mail_archive::mail::source::MailSource;
use rs_mail_archive::store::dir_archive::DirArchive;
use rs_mail_archive::sync::engine::{SyncEngine, SyncOptions, SyncReport};
use rs_mail_archive::sync::governor::RateGovernor;
use rs_mail_archive::{ArchiveError, Result};

/// Mailbox served as fixed pages; page N is answered for token "T{N}".
struct ScriptedMailbox {
    pages: Vec<Vec<&'static str>>,
    failing: Vec<&'static str>,
    list_calls: RefCell<Vec<Option<String>>>,
    fetches: RefCell<Vec<String>>,
}

impl ScriptedMailbox {
    fn new(pages: Vec<Vec<&'static str>>) -> Self {
        Self {
            pages,
            failing: vec![],
            list_calls: RefCell::new(vec![]),
            fetches: RefCell::new(vec![]),
        }
    }

    fn failing_on(mut self, id: &'static str) -> Self {
        self.failing.push(id);
        self
    }

    fn body_of(id: &str) -> String {
        format!("Subject: message {id}\r\n\r\nbody of {id}\r\n")
    }

    fn fetched(&self) -> Vec<String> {
        self.fetches.borrow().clone()
    }
}

impl MailSource for ScriptedMailbox {
    fn list_messages(&self, req: &ListRequest) -> Result<MessagePage> {
        self.list_calls.borrow_mut().push(req.page_token.clone());
        let index = match &req.page_token {
            None => 0,
            Some(t) => t.trim_start_matches('T').parse::<usize>().unwrap(),
        };
        let next = if index + 1 < self.pages.len() {
            Some(format!("T{}", index + 1))
        } else {
            Some(String::new())
        };
        Ok(MessagePage::new(
            self.pages[index].iter().map(|s| MessageId::from(*s)).collect(),
            next,
        ))
    }

    fn get_message(&self, id: &MessageId, _req: &FetchRequest) -> Result<RawMessage> {
        self.fetches.borrow_mut().push(id.to_string());
        if self.failing.contains(&id.as_str()) {
            return Err(ArchiveError::transport(
                "messages.get",
                io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
            ));
        }
        Ok(RawMessage {
            id: id.clone(),
            encoded: URL_SAFE.encode(Self::body_of(id.as_str())),
        })
    }
}

fn archive_with(ids: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for id in ids {
        fs::write(tmp.path().join(id), ScriptedMailbox::body_of(id)).unwrap();
    }
    tmp
}

fn sync(source: &ScriptedMailbox, dir: &Path, options: SyncOptions) -> Result<SyncReport> {
    SyncEngine::new(
        source,
        DirArchive::new(dir),
        RateGovernor::new(Duration::ZERO),
        options,
    )
    .run()
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn stops_at_first_archived_id_and_never_requests_the_rest() {
    let tmp = archive_with(&["A"]);
    let mailbox = ScriptedMailbox::new(vec![vec!["Z", "Y", "A", "X"], vec!["W"]]);

    let report = sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    assert_eq!(mailbox.fetched(), vec!["Z", "Y"]);
    assert_eq!(report.stopped_at, Some(MessageId::from("A")));
    assert_eq!(report.pages_listed, 1);
    assert_eq!(mailbox.list_calls.borrow().len(), 1);
    assert_eq!(files_in(tmp.path()), vec!["A", "Y", "Z"]);
}

#[test]
fn empty_archive_walks_every_page() {
    let tmp = archive_with(&[]);
    let mailbox = ScriptedMailbox::new(vec![vec!["Z", "Y"], vec!["X"]]);

    let report = sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    assert_eq!(mailbox.fetched(), vec!["Z", "Y", "X"]);
    assert_eq!(
        *mailbox.list_calls.borrow(),
        vec![None, Some("T1".to_string())]
    );
    assert_eq!(report.pages_listed, 2);
    assert_eq!(report.stopped_at, None);
    assert_eq!(files_in(tmp.path()), vec!["X", "Y", "Z"]);
}

#[test]
fn single_page_without_token_lists_once() {
    let tmp = archive_with(&[]);
    let mailbox = ScriptedMailbox::new(vec![vec!["C", "B"]]);

    sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    assert_eq!(*mailbox.list_calls.borrow(), vec![None]);
}

#[test]
fn empty_token_in_a_hand_built_page_ends_the_listing() {
    struct LoosePages {
        lists: RefCell<usize>,
    }

    impl MailSource for LoosePages {
        fn list_messages(&self, _req: &ListRequest) -> Result<MessagePage> {
            *self.lists.borrow_mut() += 1;
            if *self.lists.borrow() > 3 {
                return Err(ArchiveError::Config("listed too many times".into()));
            }
            Ok(MessagePage {
                ids: vec![MessageId::from("Z")],
                next_page_token: Some(String::new()),
            })
        }

        fn get_message(&self, id: &MessageId, _req: &FetchRequest) -> Result<RawMessage> {
            Ok(RawMessage {
                id: id.clone(),
                encoded: "aGVsbG8=".into(),
            })
        }
    }

    let tmp = TempDir::new().unwrap();
    let source = LoosePages {
        lists: RefCell::new(0),
    };
    let report = SyncEngine::new(
        &source,
        DirArchive::new(tmp.path()),
        RateGovernor::new(Duration::ZERO),
        SyncOptions::default(),
    )
    .run()
    .unwrap();

    assert_eq!(*source.lists.borrow(), 1);
    assert_eq!(report.pages_listed, 1);
    assert_eq!(report.fetched, vec![MessageId::from("Z")]);
}

#[test]
fn ids_written_during_a_run_do_not_join_the_snapshot() {
    let tmp = archive_with(&[]);
    // Z shows up again on the second page, e.g. after new mail shifted the listing
    let mailbox = ScriptedMailbox::new(vec![vec!["Z", "Y"], vec!["Z", "X"]]);

    let report = sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    assert_eq!(mailbox.fetched(), vec!["Z", "Y", "Z", "X"]);
    assert_eq!(
        report.fetched,
        vec![
            MessageId::from("Z"),
            MessageId::from("Y"),
            MessageId::from("Z"),
            MessageId::from("X"),
        ]
    );
    assert_eq!(report.stopped_at, None);
    assert_eq!(report.pages_listed, 2);
    assert_eq!(
        fs::read_to_string(tmp.path().join("Z")).unwrap(),
        ScriptedMailbox::body_of("Z")
    );
    assert_eq!(files_in(tmp.path()), vec!["X", "Y", "Z"]);
}

#[test]
fn boundary_on_a_later_page() {
    let tmp = archive_with(&["X", "W"]);
    let mailbox = ScriptedMailbox::new(vec![vec!["Z", "Y"], vec!["X", "W"], vec!["V"]]);

    let report = sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    assert_eq!(mailbox.fetched(), vec!["Z", "Y"]);
    assert_eq!(report.pages_listed, 2);
    assert_eq!(report.stopped_at, Some(MessageId::from("X")));
}

#[test]
fn second_run_fetches_nothing() {
    let tmp = archive_with(&[]);
    let mailbox = ScriptedMailbox::new(vec![vec!["Z", "Y"], vec!["X"]]);
    sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    let again = ScriptedMailbox::new(vec![vec!["Z", "Y"], vec!["X"]]);
    let report = sync(&again, tmp.path(), SyncOptions::default()).unwrap();

    assert!(again.fetched().is_empty());
    assert!(report.fetched.is_empty());
    assert_eq!(report.stopped_at, Some(MessageId::from("Z")));
}

#[test]
fn new_mail_since_last_run_is_picked_up() {
    let tmp = archive_with(&["Y", "X"]);
    let mailbox = ScriptedMailbox::new(vec![vec!["Q", "Z", "Y", "X"]]);

    let report = sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    assert_eq!(
        report.fetched,
        vec![MessageId::from("Q"), MessageId::from("Z")]
    );
}

#[test]
fn archived_files_hold_decoded_bytes() {
    let tmp = archive_with(&[]);
    let mailbox = ScriptedMailbox::new(vec![vec!["Z"]]);

    sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    assert_eq!(
        fs::read_to_string(tmp.path().join("Z")).unwrap(),
        ScriptedMailbox::body_of("Z")
    );
}

#[test]
fn preexisting_files_are_left_untouched() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("A"), b"local copy").unwrap();
    let mailbox = ScriptedMailbox::new(vec![vec!["B", "A"]]);

    sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();

    assert_eq!(fs::read(tmp.path().join("A")).unwrap(), b"local copy");
    assert!(!mailbox.fetched().contains(&"A".to_string()));
}

#[test]
fn transport_failure_aborts_and_keeps_earlier_files() {
    let tmp = archive_with(&[]);
    let mailbox = ScriptedMailbox::new(vec![vec!["Z", "Y", "X"]]).failing_on("Y");

    let err = sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap_err();

    assert!(matches!(
        err,
        ArchiveError::Transport {
            call: "messages.get",
            ..
        }
    ));
    assert_eq!(mailbox.fetched(), vec!["Z", "Y"]);
    assert_eq!(files_in(tmp.path()), vec!["Z"]);
}

#[test]
fn failed_run_is_resumed_by_the_next_one() {
    let tmp = archive_with(&[]);
    let broken = ScriptedMailbox::new(vec![vec!["Z", "Y", "X"]]).failing_on("Y");
    sync(&broken, tmp.path(), SyncOptions::default()).unwrap_err();

    // Z sits above the gap, so the newest-first rule stops on it
    let retry = ScriptedMailbox::new(vec![vec!["Z", "Y", "X"]]);
    let report = sync(&retry, tmp.path(), SyncOptions::default()).unwrap();
    assert!(report.fetched.is_empty());

    let full = SyncOptions {
        stop_at_first_known: false,
        ..SyncOptions::default()
    };
    let report = sync(&retry, tmp.path(), full).unwrap();
    assert_eq!(
        report.fetched,
        vec![MessageId::from("Y"), MessageId::from("X")]
    );
    assert_eq!(files_in(tmp.path()), vec!["X", "Y", "Z"]);
}

#[test]
fn out_of_order_feed_needs_full_scan() {
    // "M" is older than "A" in archive terms but listed after it
    let tmp = archive_with(&["A"]);
    let pages = vec![vec!["B", "A", "M"]];

    let mailbox = ScriptedMailbox::new(pages.clone());
    let report = sync(&mailbox, tmp.path(), SyncOptions::default()).unwrap();
    assert_eq!(mailbox.fetched(), vec!["B"]);
    assert!(!tmp.path().join("M").exists());

    let mailbox = ScriptedMailbox::new(pages);
    let full = SyncOptions {
        stop_at_first_known: false,
        ..SyncOptions::default()
    };
    let report_full = sync(&mailbox, tmp.path(), full).unwrap();
    assert_eq!(mailbox.fetched(), vec!["M"]);
    assert_eq!(report_full.skipped, 2);
    assert_eq!(report.stopped_at, Some(MessageId::from("A")));
}

#[test]
fn spam_and_trash_flag_reaches_every_call() {
    struct Recorder {
        flags: RefCell<HashMap<&'static str, Vec<bool>>>,
    }

    impl MailSource for Recorder {
        fn list_messages(&self, req: &ListRequest) -> Result<MessagePage> {
            self.flags
                .borrow_mut()
                .entry("list")
                .or_default()
                .push(req.include_spam_trash);
            Ok(MessagePage::new(vec!["only".into()], None))
        }

        fn get_message(&self, id: &MessageId, req: &FetchRequest) -> Result<RawMessage> {
            self.flags
                .borrow_mut()
                .entry("get")
                .or_default()
                .push(req.include_spam_trash);
            Ok(RawMessage {
                id: id.clone(),
                encoded: "aGVsbG8=".into(),
            })
        }
    }

    let tmp = TempDir::new().unwrap();
    let recorder = Recorder {
        flags: RefCell::new(HashMap::new()),
    };
    SyncEngine::new(
        &recorder,
        DirArchive::new(tmp.path()),
        RateGovernor::new(Duration::ZERO),
        SyncOptions::default(),
    )
    .run()
    .unwrap();

    let flags = recorder.flags.borrow();
    assert_eq!(flags["list"], vec![true]);
    assert_eq!(flags["get"], vec![true]);
    assert_eq!(fs::read(tmp.path().join("only")).unwrap(), b"hello");
}

#[test]
fn unreadable_archive_fails_before_listing() {
    let tmp = TempDir::new().unwrap();
    let mailbox = ScriptedMailbox::new(vec![vec!["Z"]]);

    let err = sync(&mailbox, &tmp.path().join("missing"), SyncOptions::default()).unwrap_err();

    assert!(matches!(err, ArchiveError::Snapshot { .. }));
    assert!(mailbox.list_calls.borrow().is_empty());
}

#[test]
fn metered_calls_respect_the_governor() {
    let tmp = archive_with(&[]);
    let mailbox = ScriptedMailbox::new(vec![vec!["Z", "Y"], vec!["X"]]);
    let started = std::time::Instant::now();

    SyncEngine::new(
        &mailbox,
        DirArchive::new(tmp.path()),
        RateGovernor::new(Duration::from_millis(15)),
        SyncOptions::default(),
    )
    .run()
    .unwrap();

    // 2 listings + 3 fetches, 4 gaps between them
    assert!(started.elapsed() >= Duration::from_millis(60));
}

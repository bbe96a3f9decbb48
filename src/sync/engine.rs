//! Incremental archive run.
//!
//! The remote listing is walked newest-first. Each id is checked against the
//! snapshot taken at the start of the run; unknown ids are fetched, decoded and
//! written, and the first known id ends the run because everything after it was
//! archived by an earlier run. Any failure aborts the run; files already written
//! stay on disk and the next run resumes from the top of the listing.

use crate::domain::message::{FetchRequest, ListRequest, MessageId, MessagePage};
use crate::error::{ArchiveError, Result};
use crate::mail::decoders::{decode_raw, subject_of};
use crate::mail::source::MailSource;
use crate::store::repo::{ArchiveSnapshot, ArchiveStore};
use crate::sync::governor::RateGovernor;

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub include_spam_trash: bool,
    /// End the run at the first already archived id. Only sound when the
    /// source lists strictly newest-first; turn off to walk every page and
    /// skip known ids instead.
    pub stop_at_first_known: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            include_spam_trash: true,
            stop_at_first_known: true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pages_listed: usize,
    /// Newly archived ids, in listing order
    pub fetched: Vec<MessageId>,
    /// Known ids passed over during a full scan
    pub skipped: usize,
    /// The known id that ended the run, if any
    pub stopped_at: Option<MessageId>,
}

pub struct SyncEngine<S, A> {
    source: S,
    archive: A,
    governor: RateGovernor,
    options: SyncOptions,
}

impl<S: MailSource, A: ArchiveStore> SyncEngine<S, A> {
    pub fn new(source: S, archive: A, governor: RateGovernor, options: SyncOptions) -> Self {
        Self {
            source,
            archive,
            governor,
            options,
        }
    }

    pub fn run(&mut self) -> Result<SyncReport> {
        let snapshot = self.archive.snapshot()?;
        log::info!("{} messages already archived", snapshot.len());

        let mut report = SyncReport::default();
        let mut page_token = None;

        loop {
            let page = self.list_page(page_token)?;
            report.pages_listed += 1;
            log::info!(
                "page {}: {} messages{}",
                report.pages_listed,
                page.ids.len(),
                if page.is_last() { " (last)" } else { "" }
            );

            if self.consume_page(&page, &snapshot, &mut report)? {
                return Ok(report);
            }

            // an empty token also marks the last page, however the page was built
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        log::info!("reached end of listing");
        Ok(report)
    }

    /// Returns true once the run should end.
    fn consume_page(
        &mut self,
        page: &MessagePage,
        snapshot: &ArchiveSnapshot,
        report: &mut SyncReport,
    ) -> Result<bool> {
        for (pos, id) in page.ids.iter().enumerate() {
            if snapshot.contains(id) {
                if self.options.stop_at_first_known {
                    log::info!(
                        "found already archived message {id}, stopping ({} unvisited on this page)",
                        page.ids.len() - pos - 1
                    );
                    report.stopped_at = Some(id.clone());
                    return Ok(true);
                }
                log::debug!("{id} already archived, skipping");
                report.skipped += 1;
                continue;
            }

            self.fetch_and_store(id)?;
            report.fetched.push(id.clone());
        }
        Ok(false)
    }

    fn list_page(&mut self, page_token: Option<String>) -> Result<MessagePage> {
        let req = ListRequest {
            include_spam_trash: self.options.include_spam_trash,
            page_token,
        };
        let source = &self.source;
        self.governor.metered(|| source.list_messages(&req))
    }

    fn fetch_and_store(&mut self, id: &MessageId) -> Result<()> {
        log::debug!("fetching {id}");
        let req = FetchRequest {
            include_spam_trash: self.options.include_spam_trash,
        };
        let source = &self.source;
        let raw = self.governor.metered(|| source.get_message(id, &req))?;

        let bytes = decode_raw(&raw.encoded).map_err(|source| ArchiveError::Decode {
            id: id.clone(),
            source,
        })?;
        let path = self.archive.persist(id, &bytes)?;

        match subject_of(&bytes) {
            Some(subject) => log::debug!("archived {id} ({subject}) to {}", path.display()),
            None => log::debug!("archived {id} to {}", path.display()),
        }
        Ok(())
    }
}

use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::auth::session::Session;
use crate::domain::message::{
    FetchRequest, Label, ListRequest, MessageId, MessagePage, RawMessage,
};
use crate::error::{ArchiveError, Result};
use crate::mail::source::MailSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetMessageResponse {
    id: String,
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListLabelsResponse {
    #[serde(default)]
    labels: Vec<Label>,
}

impl From<ListMessagesResponse> for MessagePage {
    fn from(r: ListMessagesResponse) -> Self {
        MessagePage::new(
            r.messages.into_iter().map(|m| MessageId::new(m.id)).collect(),
            r.next_page_token,
        )
    }
}

/// Gmail REST API client. One blocking request per call, no retries.
pub struct GmailClient {
    http: Client,
    base: Url,
    user_id: String,
    session: Session,
}

impl GmailClient {
    pub fn new(api_base: &str, user_id: impl Into<String>, session: Session) -> Result<Self> {
        let base = Url::parse(api_base)
            .map_err(|e| ArchiveError::Config(format!("invalid api_base '{api_base}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ArchiveError::Config(format!(
                "api_base '{api_base}' cannot carry a path"
            )));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ArchiveError::transport("client setup", e))?;

        Ok(Self {
            http,
            base,
            user_id: user_id.into(),
            session,
        })
    }

    fn endpoint(&self, tail: &[&str]) -> Url {
        let mut url = self.base.clone();
        // checked in new()
        if let Ok(mut segs) = url.path_segments_mut() {
            segs.pop_if_empty()
                .push("users")
                .push(&self.user_id)
                .extend(tail);
        }
        url
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        call: &'static str,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.session.access_token()?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .map_err(|e| ArchiveError::transport(call, e))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().unwrap_or_default();
            truncate_at_char(&mut body, MAX_ERROR_BODY);
            return Err(ArchiveError::Remote {
                call,
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>()
            .map_err(|e| ArchiveError::transport(call, e))
    }

    /// Labels of the mailbox; diagnostic only, not metered by the engine.
    pub fn list_labels(&self) -> Result<Vec<Label>> {
        let r: ListLabelsResponse =
            self.get_json("labels.list", self.endpoint(&["labels"]), &[])?;
        Ok(r.labels)
    }
}

impl MailSource for GmailClient {
    fn list_messages(&self, req: &ListRequest) -> Result<MessagePage> {
        let r: ListMessagesResponse =
            self.get_json("messages.list", self.endpoint(&["messages"]), &list_query(req))?;
        Ok(r.into())
    }

    fn get_message(&self, id: &MessageId, req: &FetchRequest) -> Result<RawMessage> {
        let r: GetMessageResponse = self.get_json(
            "messages.get",
            self.endpoint(&["messages", id.as_str()]),
            &fetch_query(req),
        )?;
        let encoded = r
            .raw
            .ok_or_else(|| ArchiveError::MissingPayload { id: id.clone() })?;
        Ok(RawMessage {
            id: MessageId::new(r.id),
            encoded,
        })
    }
}

fn list_query(req: &ListRequest) -> Vec<(&'static str, String)> {
    let mut q = vec![
        ("includeSpamTrash", req.include_spam_trash.to_string()),
        ("prettyPrint", "false".to_string()),
    ];
    if let Some(token) = &req.page_token {
        q.push(("pageToken", token.clone()));
    }
    q
}

fn fetch_query(req: &FetchRequest) -> Vec<(&'static str, String)> {
    vec![
        ("format", "raw".to_string()),
        ("includeSpamTrash", req.include_spam_trash.to_string()),
        ("prettyPrint", "false".to_string()),
    ]
}

fn truncate_at_char(s: &mut String, max: usize) {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
}

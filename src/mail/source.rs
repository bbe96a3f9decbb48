use crate::domain::message::{FetchRequest, ListRequest, MessageId, MessagePage, RawMessage};
use crate::error::Result;

/// Remote mailbox the sync engine reads from. Both calls are metered.
///
/// Implementations must return identifiers newest-first; the engine's early
/// termination relies on it.
pub trait MailSource {
    fn list_messages(&self, req: &ListRequest) -> Result<MessagePage>;
    fn get_message(&self, id: &MessageId, req: &FetchRequest) -> Result<RawMessage>;
}

impl<T: MailSource + ?Sized> MailSource for &T {
    fn list_messages(&self, req: &ListRequest) -> Result<MessagePage> {
        (**self).list_messages(req)
    }

    fn get_message(&self, id: &MessageId, req: &FetchRequest) -> Result<RawMessage> {
        (**self).get_message(id, req)
    }
}

pub mod telegram;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use telegram::TelegramClient;

/// Text-markup dialects understood by the messaging API
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    Markdown,
    MarkdownV2,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
            ParseMode::Markdown => "Markdown",
            ParseMode::MarkdownV2 => "MarkdownV2",
        }
    }
}

/// Outbound notification sink. Implementations must be safe to call from
/// several partition claims at once.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver already-rendered HTML text
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

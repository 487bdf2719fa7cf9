use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::BoxDynError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub plain_body: String,
    pub html_body: String,
}

/// outbound delivery. retries and timeouts belong to the implementation
pub trait EmailSender: std::fmt::Debug + Send + Sync {
    fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, Result<(), BoxDynError>>;
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("email send was cancelled")]
    Cancelled,

    #[error("failed to send email: {0}")]
    Failed(#[source] BoxDynError),
}

pub async fn dispatch(
    sender: &dyn EmailSender,
    cancel: &CancellationToken,
    message: &EmailMessage,
) -> Result<(), SendError> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(SendError::Cancelled),
        result = sender.send(message) => result.map_err(SendError::Failed),
    }
}

/// records that a message would have gone out. never logs the bodies since
/// they carry tokens
#[derive(Debug, Default)]
pub struct LogSender;

impl EmailSender for LogSender {
    fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, Result<(), BoxDynError>> {
        Box::pin(async move {
            tracing::info!(
                to = ?message.to,
                subject = %message.subject,
                "email handed off"
            );

            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::RecordingSender;

    fn message() -> EmailMessage {
        EmailMessage {
            to: vec!["a@x.com".into()],
            subject: "hello".into(),
            plain_body: "body".into(),
            html_body: "<p>body</p>".into(),
        }
    }

    #[tokio::test]
    async fn dispatch_reports_failures() {
        let sender = RecordingSender::default();
        let cancel = CancellationToken::new();

        dispatch(&sender, &cancel, &message()).await.unwrap();

        assert_eq!(sender.sent().len(), 1);

        sender.set_failing(true);

        let result = dispatch(&sender, &cancel, &message()).await;

        assert!(matches!(result, Err(SendError::Failed(_))), "{:?}", result);
        assert_eq!(sender.sent().len(), 1, "failed send was recorded");
    }

    #[tokio::test]
    async fn dispatch_honors_cancel() {
        let sender = RecordingSender::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = dispatch(&sender, &cancel, &message()).await;

        assert!(matches!(result, Err(SendError::Cancelled)), "{:?}", result);
        assert!(sender.sent().is_empty(), "cancelled send went out");
    }

    #[tokio::test]
    async fn log_sender_accepts() {
        let cancel = CancellationToken::new();

        dispatch(&LogSender, &cancel, &message()).await.unwrap();
    }
}

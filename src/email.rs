use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EmailReceipt {
    pub message_id: Option<String>,
}

/// Outbound email collaborator. The password-reset flow treats a send
/// failure as non-fatal; callers log the error and keep the generic
/// user-facing response.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_password_reset(&self, to: &str, reset_url: &str)
        -> anyhow::Result<EmailReceipt>;
}

/// Log-only sender used in development and tests. No provider credentials,
/// no network.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_password_reset(
        &self,
        to: &str,
        reset_url: &str,
    ) -> anyhow::Result<EmailReceipt> {
        info!(to, reset_url, "password reset email (log-only sender)");
        Ok(EmailReceipt { message_id: None })
    }
}

//! Outbound email. The `Notifier` trait is the seam; the SMTP
//! implementation is swapped out in tests.

use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an email; true on success. Failures are reported, not raised:
    /// callers treat delivery as best-effort.
    async fn send(&self, to: &str, subject: &str, html_body: &str, kind: &str) -> bool;
}

pub struct SmtpNotifier {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    sender: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, anyhow::Error> {
        let mailer = match (&config.host, &config.username, &config.password, &config.sender_email)
        {
            (Some(host), Some(username), Some(password), Some(_)) => {
                let creds = Credentials::new(username.clone(), password.clone());
                let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
                    .credentials(creds)
                    .port(587)
                    .timeout(Some(Duration::from_secs(10)))
                    .build();
                tracing::info!(host = %host, "email notifier initialized");
                Some(transport)
            }
            _ => {
                tracing::warn!("email notifier not configured; outbound mail disabled");
                None
            }
        };

        let sender = match &config.sender_email {
            Some(email) => format!("{} <{}>", config.sender_name, email),
            None => config.sender_name.clone(),
        };

        Ok(Self { mailer, sender })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str, kind: &str) -> bool {
        let Some(mailer) = &self.mailer else {
            tracing::warn!(to = to, subject = subject, kind = kind, "email not sent: notifier disabled");
            return false;
        };

        let message = match Message::builder()
            .from(match self.sender.parse() {
                Ok(from) => from,
                Err(e) => {
                    tracing::error!(error = %e, "invalid sender address");
                    return false;
                }
            })
            .to(match to.parse() {
                Ok(to) => to,
                Err(e) => {
                    tracing::error!(to = to, error = %e, "invalid recipient address");
                    return false;
                }
            })
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
        {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "failed to build email");
                return false;
            }
        };

        match mailer.send(message).await {
            Ok(_) => {
                tracing::info!(to = to, subject = subject, kind = kind, "email sent");
                true
            }
            Err(e) => {
                tracing::error!(to = to, error = %e, kind = kind, "email send failed");
                false
            }
        }
    }
}

/// Reset-link email body.
pub fn password_reset_body(reset_token: &str, base_url: &str, expiry_hours: i64) -> String {
    let reset_link = format!("{}/reset-password?token={}", base_url, reset_token);

    format!(
        r#"
        <html>
            <body style="font-family: Arial, sans-serif;">
                <h2>Password Reset Request</h2>
                <p>We received a request to reset your password. Click the link below to set a new password:</p>
                <p>
                    <a href="{}" style="background-color: #2196F3; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                        Reset Password
                    </a>
                </p>
                <p>Or copy and paste this link into your browser:</p>
                <p>{}</p>
                <p style="color: #666; font-size: 12px;">
                    This link will expire in {} hours. If you didn't request this, please ignore this email.
                </p>
            </body>
        </html>
        "#,
        reset_link, reset_link, expiry_hours
    )
}

/// Expiry-warning email body.
pub fn password_expiry_warning_body(days_until_expiry: i64) -> String {
    format!(
        r#"
        <html>
            <body style="font-family: Arial, sans-serif;">
                <h2>Your password expires soon</h2>
                <p>Your password will expire in {} day(s). Please change it before then to keep access to your databases.</p>
                <p style="color: #666; font-size: 12px;">
                    After expiry you will be required to reset your password before using the API.
                </p>
            </body>
        </html>
        "#,
        days_until_expiry
    )
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Captures sends instead of talking to an SMTP relay.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, String)>>,
        pub count: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, to: &str, subject: &str, html_body: &str, _kind: &str) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), html_body.to_string()));
            self.count.fetch_add(1, Ordering::SeqCst);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_body_contains_link_and_expiry() {
        let body = password_reset_body("tok123", "https://gw.example.com", 24);
        assert!(body.contains("https://gw.example.com/reset-password?token=tok123"));
        assert!(body.contains("24 hours"));
    }

    #[tokio::test]
    async fn disabled_notifier_reports_failure() {
        let config = crate::config::SmtpConfig {
            host: None,
            username: None,
            password: None,
            sender_email: None,
            sender_name: "Vibe Access".into(),
            public_base_url: "http://localhost:8080".into(),
        };
        let notifier = SmtpNotifier::new(&config).unwrap();
        assert!(!notifier.send("a@b.com", "s", "<p>x</p>", "general").await);
    }
}

//! Password reset flow and the expiry background job.

use crate::config::PasswordPolicyConfig;
use crate::services::notifier::{password_expiry_warning_body, password_reset_body, Notifier};
use crate::services::vault::{hash_reset_token, CryptoVault};
use crate::utils::password_hash::{hash_password, verify_password};
use chrono::{DateTime, Duration, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Days before expiry at which a warning email goes out.
const WARNING_DAYS: &[i64] = &[14, 7, 3, 1];

#[derive(Clone)]
pub struct PasswordService {
    pool: PgPool,
    vault: CryptoVault,
    notifier: Arc<dyn Notifier>,
    policy: PasswordPolicyConfig,
    public_base_url: String,
}

impl PasswordService {
    pub fn new(
        pool: PgPool,
        vault: CryptoVault,
        notifier: Arc<dyn Notifier>,
        policy: PasswordPolicyConfig,
        public_base_url: String,
    ) -> Self {
        Self {
            pool,
            vault,
            notifier,
            policy,
            public_base_url,
        }
    }

    /// Handle a reset request. The caller always answers with a generic
    /// success message; a token row is stored and mail sent only when an
    /// active account matches, so email addresses cannot be enumerated.
    pub async fn request_reset(
        &self,
        email: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), AppError> {
        let user: Option<(Uuid, String, bool)> =
            sqlx::query_as("SELECT id, email, is_active FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        let Some((user_id, user_email, is_active)) = user else {
            tracing::info!(email = email, "password reset requested for unknown email");
            return Ok(());
        };

        if !is_active {
            tracing::warn!(user_id = %user_id, "password reset requested for inactive user");
            return Ok(());
        }

        let token = self.vault.new_reset_token();
        let expires_at = Utc::now() + Duration::hours(self.policy.reset_token_expiry_hours);

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens
                (user_id, token_hash, email, expires_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(&token.token_hash)
        .bind(&user_email)
        .bind(expires_at)
        .bind(&ip_address)
        .bind(&user_agent)
        .execute(&self.pool)
        .await?;

        let body = password_reset_body(
            &token.plaintext,
            &self.public_base_url,
            self.policy.reset_token_expiry_hours,
        );
        let sent = self
            .notifier
            .send(&user_email, "Reset your password", &body, "password_reset")
            .await;

        self.record_notification(user_id, "password_reset", &user_email, sent)
            .await;

        if sent {
            tracing::info!(user_id = %user_id, "password reset email sent");
        } else {
            tracing::error!(user_id = %user_id, "password reset email failed");
        }

        Ok(())
    }

    /// Consume a reset token and set the new password.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let token_hash = hash_reset_token(token);

        let record: Option<(Uuid, Uuid, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT id, user_id, expires_at, used_at
            FROM password_reset_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some((token_id, user_id, expires_at, used_at)) = record else {
            tracing::warn!("password reset with invalid token");
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid or expired reset token"
            )));
        };

        if used_at.is_some() {
            tracing::warn!(user_id = %user_id, "password reset token reuse attempt");
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "This reset token has already been used"
            )));
        }

        if Utc::now() > expires_at {
            tracing::warn!(user_id = %user_id, "password reset token expired");
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Reset token has expired. Please request a new one."
            )));
        }

        let user: Option<(Uuid, String, bool)> =
            sqlx::query_as("SELECT id, password_hash, is_active FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((_, current_hash, true)) = user else {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "User account not found or inactive"
            )));
        };

        if verify_password(new_password, &current_hash) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "New password cannot be the same as current password"
            )));
        }

        let history: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT password_hash
            FROM password_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(self.policy.history_depth)
        .fetch_all(&self.pool)
        .await?;

        for (old_hash,) in &history {
            if verify_password(new_password, old_hash) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Cannot reuse a recent password. Please choose a different one."
                )));
            }
        }

        let new_hash = hash_password(new_password)?;
        let expires_at = Utc::now() + Duration::days(self.policy.expiry_days);

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO password_history (user_id, password_hash) VALUES ($1, $2)")
            .bind(user_id)
            .bind(&current_hash)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1,
                password_changed_at = NOW(),
                password_expires_at = $2,
                password_reset_required = false,
                failed_login_attempts = 0,
                locked_until = NULL,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(&new_hash)
        .bind(expires_at)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE id = $1")
            .bind(token_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "password reset successful");
        Ok(())
    }

    /// One pass of the expiry job: warn users approaching expiry and flag
    /// accounts whose passwords have lapsed.
    pub async fn check_expiring_passwords(&self) -> Result<(), AppError> {
        let expiring: Vec<(Uuid, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, email, password_expires_at
            FROM users
            WHERE is_active = true
              AND password_expires_at IS NOT NULL
              AND password_expires_at > NOW()
              AND password_expires_at <= NOW() + INTERVAL '14 days'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut warned = 0;
        for (user_id, email, expires_at) in &expiring {
            let days_until_expiry = (*expires_at - Utc::now()).num_days();
            if !WARNING_DAYS.contains(&days_until_expiry) {
                continue;
            }

            if self.recently_warned(*user_id).await? {
                continue;
            }

            let body = password_expiry_warning_body(days_until_expiry);
            let sent = self
                .notifier
                .send(email, "Your password expires soon", &body, "password_expiry_warning")
                .await;
            self.record_notification(*user_id, "password_expiry_warning", email, sent)
                .await;

            if sent {
                warned += 1;
                tracing::info!(
                    user_id = %user_id,
                    days_until_expiry = days_until_expiry,
                    "password expiry warning sent"
                );
            }
        }

        let expired = sqlx::query(
            r#"
            UPDATE users
            SET password_reset_required = true, updated_at = NOW()
            WHERE is_active = true
              AND password_expires_at < NOW()
              AND password_reset_required = false
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!(
            users_warned = warned,
            users_expired = expired.rows_affected(),
            "password expiry check complete"
        );
        Ok(())
    }

    async fn recently_warned(&self, user_id: Uuid) -> Result<bool, AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM email_notifications
            WHERE user_id = $1
              AND email_type = 'password_expiry_warning'
              AND created_at >= NOW() - INTERVAL '1 day'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn record_notification(&self, user_id: Uuid, email_type: &str, to_email: &str, sent: bool) {
        let error_message = if sent { None } else { Some("send failed") };
        if let Err(e) = sqlx::query(
            r#"
            INSERT INTO email_notifications (user_id, email_type, to_email, error_message)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(email_type)
        .bind(to_email)
        .bind(error_message)
        .execute(&self.pool)
        .await
        {
            tracing::warn!(error = %e, "email notification record failed");
        }
    }
}

/// Run the expiry check on a fixed interval until the process exits.
pub fn spawn_expiry_job(service: PasswordService) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(6 * 60 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = service.check_expiring_passwords().await {
                tracing::error!(error = %e, "password expiry check failed");
            }
        }
    })
}

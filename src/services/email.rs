// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound email.
//!
//! Production sends through an HTTP mail API (SendGrid v3 request shape).
//! Development without an API key only logs the message.

use crate::config::EmailConfig;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::json;

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    /// Link the message asks the recipient to follow.
    pub action_url: String,
}

impl Email {
    pub fn password_reset(to: &str, name: &str, url: &str) -> Self {
        let first = first_name(name);
        Self {
            to: to.to_string(),
            to_name: name.to_string(),
            subject: "Your password reset token (valid for only 10 minutes)".to_string(),
            text: format!(
                "Hi {first},\n\nForgot your password? Submit a PATCH request with your new \
                 password and passwordConfirm to: {url}\n\nIf you didn't forget your password, \
                 please ignore this email."
            ),
            html: format!(
                "<p>Hi {first},</p><p>Forgot your password? Reset it here: \
                 <a href=\"{url}\">{url}</a></p><p>If you didn't forget your password, \
                 please ignore this email.</p>"
            ),
            action_url: url.to_string(),
        }
    }

    pub fn email_verification(to: &str, name: &str, url: &str) -> Self {
        let first = first_name(name);
        Self {
            to: to.to_string(),
            to_name: name.to_string(),
            subject: "Verify your email address (valid for only 10 minutes)".to_string(),
            text: format!(
                "Welcome to Natours, {first}!\n\nPlease confirm your email address: {url}"
            ),
            html: format!(
                "<p>Welcome to Natours, {first}!</p><p>Please confirm your email address: \
                 <a href=\"{url}\">{url}</a></p>"
            ),
            action_url: url.to_string(),
        }
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), AppError>;
}

/// Mail API client.
#[derive(Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &EmailConfig, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            from: config.from.clone(),
        }
    }

    /// Split `Name <addr>` into its parts.
    fn from_parts(&self) -> (Option<&str>, &str) {
        match (self.from.find('<'), self.from.rfind('>')) {
            (Some(start), Some(end)) if start < end => {
                let name = self.from[..start].trim();
                let addr = self.from[start + 1..end].trim();
                ((!name.is_empty()).then_some(name), addr)
            }
            _ => (None, self.from.trim()),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), AppError> {
        let (from_name, from_addr) = self.from_parts();
        let body = json!({
            "personalizations": [{
                "to": [{ "email": email.to, "name": email.to_name }]
            }],
            "from": { "email": from_addr, "name": from_name },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html }
            ]
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Mail API request failed");
                AppError::Upstream(
                    "There was an error sending the email. Try again later!".to_string(),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %text, "Mail API rejected message");
            return Err(AppError::Upstream(
                "There was an error sending the email. Try again later!".to_string(),
            ));
        }

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), AppError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            url = %email.action_url,
            "Email (not sent, no mail API key configured)"
        );
        Ok(())
    }
}

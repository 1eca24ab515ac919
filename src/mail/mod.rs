//! Outbound email.
//!
//! Handlers that notify people (inquiry replies, application approvals) talk
//! to the [`MailSender`] trait. The bundled senders either log the message
//! or keep it in memory; an SMTP or HTTP-API transport plugs in the same way.
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────┐      ┌─────────────────┐
//! │ reply / status   │ ───▶ │  MailSender  │ ───▶ │ LogMailer       │
//! │    handlers      │      │    trait     │      │ MemoryMailer    │
//! └──────────────────┘      └──────────────┘      └─────────────────┘
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::MailError;

/// Business name used in subjects and signatures.
pub const DEFAULT_SITE_NAME: &str = "E&S Decorations";

/// One outbound message with plain-text and HTML alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl Email {
    /// Admin reply to a contact-form inquiry.
    pub fn inquiry_reply(
        site_name: &str,
        to: impl Into<String>,
        text_body: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: format!("Reply to Your Inquiry - {}", site_name),
            text_body: text_body.into(),
            html_body: html_body.into(),
        }
    }

    /// Job offer sent when an application is approved.
    pub fn acceptance(site_name: &str, to: impl Into<String>, applicant_name: &str) -> Self {
        let text_body = format!(
            "Dear {name},\n\n\
             Thank you for your interest in {site}. After reviewing your application, \
             we are pleased to offer you a position on our team!\n\n\
             Our recruiting team will be in touch soon with the next steps, including \
             contract signing, onboarding details, and your official start date. \
             If you have any questions, feel free to reach out.\n\n\
             We look forward to working with you!\n\n\
             Best regards,\n\
             {site} Recruiting Team\n",
            name = applicant_name,
            site = site_name,
        );

        let name = escape_html(applicant_name);
        let site = escape_html(site_name);
        let html_body = format!(
            "<p>Dear {name},</p>\n\
             <p>Thank you for your interest in {site}. After reviewing your application, \
             we are pleased to offer you a position on our team!</p>\n\
             <p>Our recruiting team will be in touch soon with the next steps, including \
             contract signing, onboarding details, and your official start date. \
             If you have any questions, feel free to reach out.</p>\n\
             <p>We look forward to working with you!</p>\n\
             <p>Best regards,<br>{site} Recruiting Team</p>\n",
        );

        Self {
            to: to.into(),
            subject: format!("Welcome to {}!", site_name),
            text_body,
            html_body,
        }
    }
}

/// Escape text for interpolation into HTML.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Delivers outbound email.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send one message. An `Ok` means the transport accepted it.
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Writes each message to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Email queued (log transport)");
        debug!(body = %email.text_body, "Email body");
        Ok(())
    }
}

/// Keeps sent messages in memory.
///
/// A failing instance rejects every message, for exercising error paths.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
    fail_with: Option<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose transport always fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    /// Messages accepted so far, oldest first.
    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl MailSender for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if let Some(reason) = &self.fail_with {
            return Err(MailError::Delivery(reason.clone()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(email);
        Ok(())
    }
}

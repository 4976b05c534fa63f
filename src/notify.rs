use anyhow::{bail, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::env;
use std::time::Duration;

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SUBJECT_PREFIX: &str = "[nurseTracker]";
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub email_from: String,
    pub email_to: Vec<String>,
    pub email_cc: Vec<String>,
    pub subject_prefix: String,
}

fn split_emails(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl SmtpSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let Some(host) = var("SMTP_HOST") else {
            bail!("Missing SMTP_HOST");
        };
        let port = match var("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid SMTP_PORT: {}", raw))?,
            None => DEFAULT_SMTP_PORT,
        };
        let user = var("SMTP_USER");
        let password = var("SMTP_PASS");

        let Some(email_from) = var("EMAIL_FROM").or_else(|| user.clone()) else {
            bail!("Missing EMAIL_FROM (or SMTP_USER)");
        };
        let email_to = split_emails(&var("EMAIL_TO").unwrap_or_default());
        if email_to.is_empty() {
            bail!("Missing EMAIL_TO");
        }

        Ok(Self {
            host,
            port,
            user,
            password,
            email_from,
            email_to,
            email_cc: split_emails(&var("EMAIL_CC").unwrap_or_default()),
            subject_prefix: get("EMAIL_SUBJECT_PREFIX")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| DEFAULT_SUBJECT_PREFIX.to_string()),
        })
    }

    pub fn full_subject(&self, subject: &str) -> String {
        format!("{} {}", self.subject_prefix, subject).trim().to_string()
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse::<Mailbox>()
        .with_context(|| format!("Invalid email address: {}", address))
}

/// Build the message without sending it.
pub fn build_html_email(smtp: &SmtpSettings, subject: &str, html: &str) -> Result<Message> {
    let mut builder = Message::builder()
        .from(mailbox(&smtp.email_from)?)
        .subject(smtp.full_subject(subject))
        .header(ContentType::TEXT_HTML);

    for to in &smtp.email_to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &smtp.email_cc {
        builder = builder.cc(mailbox(cc)?);
    }

    builder
        .body(html.to_string())
        .context("Failed to build email message")
}

/// Send an HTML email over STARTTLS.
pub fn send_html_email(smtp: &SmtpSettings, subject: &str, html: &str) -> Result<()> {
    let message = build_html_email(smtp, subject, html)?;

    let mut transport = SmtpTransport::starttls_relay(&smtp.host)
        .with_context(|| format!("Failed to set up SMTP relay {}", smtp.host))?
        .port(smtp.port)
        .timeout(Some(SMTP_TIMEOUT));

    if let (Some(user), Some(password)) = (&smtp.user, &smtp.password) {
        transport = transport.credentials(Credentials::new(user.clone(), password.clone()));
    }

    transport
        .build()
        .send(&message)
        .with_context(|| format!("Failed to send email via {}:{}", smtp.host, smtp.port))?;

    log::info!("Email sent to {} recipient(s)", smtp.email_to.len() + smtp.email_cc.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_settings_defaults() {
        let smtp = SmtpSettings::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "bot@example.com"),
            ("EMAIL_TO", "a@example.com, b@example.com,"),
        ]))
        .unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.email_from, "bot@example.com");
        assert_eq!(smtp.email_to, vec!["a@example.com", "b@example.com"]);
        assert!(smtp.email_cc.is_empty());
        assert_eq!(smtp.full_subject("Daily"), "[nurseTracker] Daily");
    }

    #[test]
    fn test_settings_missing_fields() {
        assert!(SmtpSettings::from_lookup(lookup(&[("EMAIL_TO", "a@example.com")])).is_err());
        assert!(SmtpSettings::from_lookup(lookup(&[("SMTP_HOST", "h"), ("EMAIL_TO", "a@example.com")])).is_err());
        assert!(SmtpSettings::from_lookup(lookup(&[("SMTP_HOST", "h"), ("EMAIL_FROM", "x@example.com")])).is_err());
        assert!(SmtpSettings::from_lookup(lookup(&[
            ("SMTP_HOST", "h"),
            ("SMTP_PORT", "abc"),
            ("EMAIL_FROM", "x@example.com"),
            ("EMAIL_TO", "a@example.com"),
        ]))
        .is_err());
    }

    #[test]
    fn test_build_message() {
        let smtp = SmtpSettings::from_lookup(lookup(&[
            ("SMTP_HOST", "h"),
            ("EMAIL_FROM", "bot@example.com"),
            ("EMAIL_TO", "a@example.com"),
            ("EMAIL_CC", "c@example.com"),
            ("EMAIL_SUBJECT_PREFIX", ""),
        ]))
        .unwrap();
        let message = build_html_email(&smtp, "Digest", "<p>hi</p>").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Digest"));
        assert!(raw.contains("Cc: c@example.com"));
        assert!(raw.contains("text/html"));
    }
}

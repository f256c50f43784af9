use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::{
    config::SmtpSettings,
    models::{ConferenceSession, Event, InvitationStatus, User},
};

/// An outgoing message with both plain-text and HTML bodies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// MailOutcome
///
/// `{ok, error?}`. Senders report failure here instead of returning `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MailOutcome {
    pub fn sent() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: MailMessage) -> MailOutcome;
}

pub type MailerState = Arc<dyn MailSender>;

/// Rejects CR/LF in header values to prevent header injection.
fn check_header_value(name: &str, value: &str) -> Result<(), String> {
    if value.contains('\n') || value.contains('\r') {
        return Err(format!("email {name} contains invalid characters"));
    }
    Ok(())
}

/// SmtpMailer
///
/// Sends through a STARTTLS relay as multipart/alternative (plain + HTML).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, String> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| format!("invalid SMTP_FROM address '{}': {e}", settings.from))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| format!("SMTP relay setup failed: {e}"))?
            .port(settings.port);

        if let Some(username) = &settings.username {
            let password = settings.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build(&self, message: &MailMessage) -> Result<Message, String> {
        check_header_value("recipient", &message.to)?;
        check_header_value("subject", &message.subject)?;

        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| format!("invalid recipient address '{}': {e}", message.to))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| format!("failed to build email: {e}"))
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    #[tracing::instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: MailMessage) -> MailOutcome {
        let email = match self.build(&message) {
            Ok(email) => email,
            Err(e) => return MailOutcome::failed(e),
        };

        match self.transport.send(email).await {
            Ok(_) => {
                tracing::info!(subject = %message.subject, "email sent");
                MailOutcome::sent()
            }
            Err(e) => {
                tracing::warn!(error = %e, "email send failed");
                MailOutcome::failed(e.to_string())
            }
        }
    }
}

/// LogMailer
///
/// Used when SMTP is not configured (local only): logs the recipient and
/// subject, never the body, and reports success.
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, message: MailMessage) -> MailOutcome {
        if let Err(e) = check_header_value("recipient", &message.to)
            .and_then(|_| check_header_value("subject", &message.subject))
        {
            return MailOutcome::failed(e);
        }
        tracing::warn!(
            to = %message.to,
            subject = %message.subject,
            "SMTP not configured, email not sent"
        );
        MailOutcome::sent()
    }
}

/// RecordingMailer
///
/// Keeps every message in memory. Used by tests to assert on outgoing mail.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub should_fail: bool,
    sent: Arc<Mutex<Vec<MailMessage>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, message: MailMessage) -> MailOutcome {
        if self.should_fail {
            return MailOutcome::failed("Mock Mail Error: Simulation requested");
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        MailOutcome::sent()
    }
}

// --- Messages composed by the service ---

pub fn otp_message(to: &str, code: &str, ttl_minutes: i64) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: "Your conference portal sign-in code".to_string(),
        text: format!(
            "Your sign-in code is {code}. It expires in {ttl_minutes} minutes and can be used once."
        ),
        html: format!(
            "<p>Your sign-in code is <strong>{code}</strong>.</p>\
             <p>It expires in {ttl_minutes} minutes and can be used once.</p>"
        ),
    }
}

pub fn invitation_message(
    faculty: &User,
    event: &Event,
    session: &ConferenceSession,
) -> MailMessage {
    let when = session.starts_at.format("%Y-%m-%d %H:%M UTC");
    let hall = session.hall.as_deref().unwrap_or("TBA");
    MailMessage {
        to: faculty.email.clone(),
        subject: format!("Speaker invitation: {}", event.name),
        text: format!(
            "Dear {},\n\nYou are invited to speak at \"{}\" during {} ({}).\n\
             Session: {}\nHall: {}\n\nPlease accept or decline from your faculty dashboard.",
            faculty.name, session.title, event.name, event.venue, when, hall
        ),
        html: format!(
            "<p>Dear {},</p><p>You are invited to speak at <strong>{}</strong> during {} ({}).</p>\
             <p>Session: {}<br>Hall: {}</p><p>Please accept or decline from your faculty dashboard.</p>",
            escape_html(&faculty.name),
            escape_html(&session.title),
            escape_html(&event.name),
            escape_html(&event.venue),
            when,
            escape_html(hall)
        ),
    }
}

pub fn invitation_response_message(
    organizer: &User,
    faculty: &User,
    session: &ConferenceSession,
    status: InvitationStatus,
) -> MailMessage {
    let verb = match status {
        InvitationStatus::Accepted => "accepted",
        InvitationStatus::Declined => "declined",
        InvitationStatus::Pending => "not yet answered",
    };
    MailMessage {
        to: organizer.email.clone(),
        subject: format!("{} {} the invitation for \"{}\"", faculty.name, verb, session.title),
        text: format!(
            "{} ({}) has {} the invitation to speak at \"{}\".",
            faculty.name, faculty.email, verb, session.title
        ),
        html: format!(
            "<p>{} ({}) has {} the invitation to speak at <strong>{}</strong>.</p>",
            escape_html(&faculty.name),
            escape_html(&faculty.email),
            verb,
            escape_html(&session.title)
        ),
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

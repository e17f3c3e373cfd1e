// glacierrestore/src/notify/mod.rs
use chrono::Local;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use crate::config::MailConfig;
use crate::errors::{AppError, Result};

const DOCUMENTATION_URL: &str = "https://www.documentation.aws-s3-glacier-restore.com";

/// Per-run context carrying the run's correlation id and the recipients
/// accumulated while walking the manifest. Passed explicitly to every step so
/// no step has to reach for shared mutable state.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub run_id: Uuid,
    pub recipients: Vec<String>,
}

impl RunContext {
    pub fn new() -> Self {
        RunContext {
            run_id: Uuid::new_v4(),
            recipients: Vec::new(),
        }
    }

    pub fn add_recipient(&mut self, email: &str) {
        let email = email.trim();
        if !email.is_empty() && !self.recipients.iter().any(|r| r == email) {
            self.recipients.push(email.to_string());
        }
    }
}

/// Event kinds the notifier knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    ValidationFailure,
    NotFound,
    GenericFailure,
    NeverArchived,
    Completion,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub kind: AlertKind,
    pub detail: String,
}

impl Event {
    pub fn new(kind: AlertKind, detail: impl Into<String>) -> Self {
        Event {
            kind,
            detail: detail.into(),
        }
    }
}

/// Renders the subject and fixed HTML body for an event.
pub fn render(event: &Event) -> (String, String) {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");
    let (subject, heading, lines) = match event.kind {
        AlertKind::ValidationFailure => (
            "AWS S3 Glacier Restore Alert",
            format!(r#"AWS S3 Glacier Restore <span style="color:red;">Alert</span> @ {now}"#),
            format!(
                "<h4>{}<br/></h4>\n\
                 <h4>Please review the documentation for entering data in the restore manifest before trying again.<br/></h4>",
                event.detail
            ),
        ),
        AlertKind::NotFound => (
            "AWS S3 Glacier Restore Alert",
            format!(r#"AWS S3 Glacier Restore <span style="color:red;">Alert</span> @ {now}"#),
            format!(
                "<h4>{}<br/></h4>\n\
                 <h4>Please ensure the correct information is entered and review the documentation before trying another restore.<br/></h4>",
                event.detail
            ),
        ),
        AlertKind::GenericFailure => (
            "AWS S3 Glacier Restore Alert",
            format!(r#"AWS S3 Glacier Restore <span style="color:red;">Alert</span> @ {now}"#),
            format!(
                "<h4>An error has occurred with the information provided: {}.<br/></h4>\n\
                 <h4>Please ensure the correct information is entered and review the documentation before trying another restore.<br/></h4>",
                event.detail
            ),
        ),
        AlertKind::NeverArchived => (
            "AWS S3 Glacier Restore Alert",
            format!(r#"AWS S3 Glacier Restore <span style="color:red;">Notice</span> @ {now}"#),
            format!(
                "<h4>{}<br/></h4>\n\
                 <h4>No restore was necessary; the file is already immediately accessible.<br/></h4>",
                event.detail
            ),
        ),
        AlertKind::Completion => (
            "AWS S3 Glacier Restore Completion",
            format!(r#"AWS S3 Glacier Restore <span style="color:green;">Complete</span> @ {now}"#),
            format!(
                "<h4>{}<br/></h4>\n\
                 <h4>The file is now in Standard storage and ready for immediate access.<br/></h4>",
                event.detail
            ),
        ),
    };

    let html = format!(
        "<html>\n\
         <a href=\"{DOCUMENTATION_URL}\">S3 Glacier Restore Documentation</a>\n\
         <h3>{heading}</h3>\n\
         <br/>\n\
         {lines}\n\
         </html>"
    );
    (subject.to_string(), html)
}

/// Seam for notification delivery so the restore flow can be exercised
/// without a mail relay.
pub trait Notify {
    async fn send(&self, ctx: &RunContext, event: &Event) -> Result<()>;
}

/// SMTP notifier. Delivery is fire-and-forget: no retries, no delivery
/// confirmation beyond the relay accepting the message.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = config.from_address.parse().map_err(|e| {
            AppError::Config(format!(
                "Invalid from_address '{}' in config.json: {}",
                config.from_address, e
            ))
        })?;
        // Internal relay, plain SMTP.
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.relay_host)
            .port(config.port)
            .build();
        Ok(Mailer { transport, from })
    }
}

impl Notify for Mailer {
    async fn send(&self, ctx: &RunContext, event: &Event) -> Result<()> {
        if ctx.recipients.is_empty() {
            println!("⚠️ [{}] No recipients accumulated; skipping notification.", ctx.run_id);
            return Ok(());
        }

        let (subject, html) = render(event);
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML);
        for recipient in &ctx.recipients {
            let mailbox: Mailbox = recipient.parse().map_err(|e| {
                AppError::Mail(format!("Invalid recipient address '{}': {}", recipient, e))
            })?;
            builder = builder.to(mailbox);
        }
        let message = builder
            .body(html)
            .map_err(|e| AppError::Mail(format!("Failed to build notification email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(format!("SMTP send failed: {}", e)))?;

        println!(
            "📧 [{}] Sent {:?} notification to {} recipient(s).",
            ctx.run_id,
            event.kind,
            ctx.recipients.len()
        );
        Ok(())
    }
}

//! Notification senders: one persistent SMTP connection, or a dry-run logger.

use anyhow::{Context, Result};
use lettre::Message;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::extension::ClientId;
use log::{debug, info};
use std::path::Path;
use std::time::Duration;

use crate::engine::message::MessageTemplate;
use crate::error::DispatchError;
use crate::utils::config::DefaultSettings;

/// Sends one documentation request. Not required to be thread-safe: the pipeline only calls it
/// through a serialized resource. `release` is called exactly once at teardown.
pub trait Notify: Send {
    fn notify(&mut self, identity: &str, file: &Path, line: usize) -> Result<(), DispatchError>;

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F> Notify for F
where
    F: FnMut(&str, &Path, usize) -> Result<(), DispatchError> + Send,
{
    fn notify(&mut self, identity: &str, file: &Path, line: usize) -> Result<(), DispatchError> {
        self(identity, file, line)
    }
}

/// Where and how to connect.
#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Tried when connecting to `port` fails.
    pub fallback_port: Option<u16>,
    pub credentials: Option<(String, String)>,
}

/// Holds a single SMTP session for the whole run; `release` sends `QUIT`.
pub struct SmtpNotifier {
    conn: SmtpConnection,
    from: Mailbox,
    template: MessageTemplate,
}

fn connect_once(host: &str, port: u16) -> Result<SmtpConnection> {
    SmtpConnection::connect(
        (host, port),
        Some(Duration::from_secs(DefaultSettings::SMTP_TIMEOUT_SECS)),
        &ClientId::Domain("localhost".to_string()),
        None,
        None,
    )
    .with_context(|| format!("connect to SMTP server {host}:{port}"))
}

impl SmtpNotifier {
    /// Open the connection (falling back to the second port if given) and authenticate.
    pub fn connect(settings: &SmtpSettings, template: MessageTemplate) -> Result<Self> {
        let from: Mailbox = template
            .sender
            .parse()
            .with_context(|| format!("invalid sender address {:?}", template.sender))?;
        let mut conn = match (connect_once(&settings.host, settings.port), settings.fallback_port) {
            (Ok(conn), _) => conn,
            (Err(e), Some(fallback)) => {
                debug!("{:#}; retrying on port {}", e, fallback);
                connect_once(&settings.host, fallback)?
            }
            (Err(e), None) => return Err(e),
        };
        if let Some((user, password)) = &settings.credentials {
            conn.auth(
                &[Mechanism::Plain, Mechanism::Login],
                &Credentials::new(user.clone(), password.clone()),
            )
            .context("SMTP authentication")?;
        }
        info!("Connected to SMTP server {}", settings.host);
        Ok(SmtpNotifier {
            conn,
            from,
            template,
        })
    }
}

impl Notify for SmtpNotifier {
    fn notify(&mut self, identity: &str, file: &Path, line: usize) -> Result<(), DispatchError> {
        let fail = |reason: String| DispatchError {
            identity: identity.to_string(),
            file: file.to_path_buf(),
            line,
            reason,
        };
        let to: Mailbox = identity
            .parse()
            .map_err(|e| fail(format!("invalid recipient: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(self.template.subject.clone())
            .body(self.template.body(identity, file, line))
            .map_err(|e| fail(format!("build message: {e}")))?;
        self.conn
            .send(message.envelope(), &message.formatted())
            .map_err(|e| fail(format!("send: {e}")))?;
        info!("Mailed {} about {}:{}", identity, file.display(), line);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.conn.quit().context("SMTP QUIT")?;
        debug!("SMTP connection closed");
        Ok(())
    }
}

/// Logs each message instead of sending it.
pub struct DryRunNotifier {
    template: MessageTemplate,
    sent: usize,
}

impl DryRunNotifier {
    pub fn new(template: MessageTemplate) -> Self {
        DryRunNotifier { template, sent: 0 }
    }

    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl Notify for DryRunNotifier {
    fn notify(&mut self, identity: &str, file: &Path, line: usize) -> Result<(), DispatchError> {
        self.sent += 1;
        info!("[dry-run] would mail {} about {}:{}", identity, file.display(), line);
        debug!(
            "[dry-run] Subject: {}\n{}",
            self.template.subject,
            self.template.body(identity, file, line)
        );
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        debug!("[dry-run] {} messages logged", self.sent);
        Ok(())
    }
}

use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Notifier, Story};
use crate::config::SmtpConfig;

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    name: String,
}

/// `email-<recipient>`.
pub fn sink_name(cfg: &SmtpConfig) -> String {
    format!("email-{}", cfg.to.trim())
}

impl EmailNotifier {
    pub fn new(cfg: &SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("invalid smtp host {:?}", cfg.host))?
            .credentials(creds);
        if let Some(port) = cfg.port {
            builder = builder.port(port);
        }

        let from = cfg
            .from
            .parse()
            .with_context(|| format!("invalid sender address {:?}", cfg.from))?;
        let to = cfg
            .to
            .parse()
            .with_context(|| format!("invalid recipient address {:?}", cfg.to))?;

        Ok(Self {
            mailer: builder.build(),
            from,
            to,
            name: sink_name(cfg),
        })
    }
}

fn subject(story: &Story) -> String {
    if story.score > 0.0 {
        format!("[{:.0}%] {}", story.score * 100.0, story.title)
    } else {
        story.title.clone()
    }
}

fn body(story: &Story) -> String {
    let mut b = format!("{}\n\n{}\n", story.title, story.url);
    if story.score > 0.0 {
        b.push_str(&format!(
            "\nRelevance: {:.0}%\nMatched interest: {}\n",
            story.score * 100.0,
            story.reason
        ));
    }
    b
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, story: &Story) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(story))
            .header(header::ContentType::TEXT_PLAIN)
            .body(body(story))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}

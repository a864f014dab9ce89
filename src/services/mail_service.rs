//! 邮件发送（SMTP）

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;

use crate::{config::MailConfig, error::AppError};

/// 待发送的邮件
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    cc: Vec<Mailbox>,
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, AppError> {
    raw.trim()
        .parse::<Mailbox>()
        .map_err(|_| AppError::BadRequest(format!("Invalid email address: {}", raw.trim())))
}

/// 逗号或分号分隔的地址列表
pub fn parse_address_list(raw: &str) -> Result<Vec<Mailbox>, AppError> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_mailbox)
        .collect()
}

impl SmtpMailer {
    /// 未配置 SMTP 主机时返回 `None`
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>, AppError> {
        let Some(host) = config.host.as_deref().filter(|h| !h.trim().is_empty()) else {
            return Ok(None);
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP host: {}", e)))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().clone(),
            ));
        }

        let from = parse_mailbox(&config.from)
            .map_err(|_| AppError::Config(format!("Invalid mail.from address: {}", config.from)))?;
        let cc = parse_address_list(config.cc.as_deref().unwrap_or_default())
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Some(Self {
            transport: builder.build(),
            from,
            cc,
        }))
    }

    fn build_message(&self, mail: OutgoingMail) -> Result<Message, AppError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&mail.to)?)
            .subject(mail.subject);
        for cc in &self.cc {
            builder = builder.cc(cc.clone());
        }

        let content_type = ContentType::parse("image/jpeg")
            .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;

        builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body))
                    .singlepart(Attachment::new(mail.attachment_name).body(mail.attachment, content_type)),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        let to = mail.to.clone();
        let message = self.build_message(mail)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Upstream(format!("SMTP send failed: {}", e)))?;

        tracing::info!(to = %to, "Email sent");
        Ok(())
    }
}

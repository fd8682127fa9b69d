use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// Outbound notification boundary. Returns `true` only when delivery
/// reported success; every failure is logged and collapsed to `false` so the
/// engine can treat a failed dispatch as a normal, retryable outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, recipient: &str, product_name: &str, product_url: &str) -> bool;
}

/// SMTP email dispatcher with a fixed restock template.
pub struct EmailNotifier {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> crate::Result<Self> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    fn from_mailbox(&self) -> Result<Mailbox, lettre::address::AddressError> {
        let address = self
            .config
            .from_address
            .as_deref()
            .or(self.config.username.as_deref())
            .unwrap_or("restock-watcher@localhost");

        format!("{} <{}>", self.config.from_name, address).parse()
    }

    fn subject(product_name: &str) -> String {
        format!("{} is back in stock!", product_name)
    }

    fn body(product_name: &str, product_url: &str) -> String {
        format!(
            "Great news! The product you've been waiting for is back in stock:\n\
             \n\
             Product: {}\n\
             URL: {}\n\
             \n\
             Don't wait too long - it might go out of stock again!\n\
             \n\
             ---\n\
             Restock Watcher",
            product_name, product_url
        )
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn dispatch(&self, recipient: &str, product_name: &str, product_url: &str) -> bool {
        let from = match self.from_mailbox() {
            Ok(from) => from,
            Err(e) => {
                tracing::error!(error = %e, "invalid sender address");
                return false;
            }
        };

        let to: Mailbox = match recipient.parse() {
            Ok(to) => to,
            Err(e) => {
                tracing::error!(recipient, error = %e, "invalid recipient address");
                return false;
            }
        };

        let email = match Message::builder()
            .from(from)
            .to(to)
            .subject(Self::subject(product_name))
            .header(ContentType::TEXT_PLAIN)
            .body(Self::body(product_name, product_url))
        {
            Ok(email) => email,
            Err(e) => {
                tracing::error!(recipient, error = %e, "failed to build message");
                return false;
            }
        };

        match self.transport.send(email).await {
            Ok(_) => {
                tracing::info!(recipient, product_name, "notification email sent");
                true
            }
            Err(e) => {
                tracing::error!(recipient, product_name, error = %e, "failed to send email");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SmtpConfig {
        SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: Some("watcher@example.com".to_string()),
            password: Some("secret".to_string()),
            from_address: None,
            from_name: "Restock Watcher".to_string(),
            use_tls: false,
        }
    }

    #[test]
    fn test_subject_formatting() {
        assert_eq!(
            EmailNotifier::subject("Mechanical Keyboard"),
            "Mechanical Keyboard is back in stock!"
        );
    }

    #[test]
    fn test_body_contains_name_and_url() {
        let body = EmailNotifier::body("Mechanical Keyboard", "https://shop.example.com/kb");
        assert!(body.contains("Product: Mechanical Keyboard"));
        assert!(body.contains("URL: https://shop.example.com/kb"));
        assert!(body.contains("back in stock"));
    }

    #[test]
    fn test_from_mailbox_falls_back_to_username() {
        let notifier = EmailNotifier::new(test_config()).unwrap();
        let mailbox = notifier.from_mailbox().unwrap();
        assert_eq!(mailbox.email.to_string(), "watcher@example.com");
    }

    #[test]
    fn test_from_mailbox_prefers_from_address() {
        let mut config = test_config();
        config.from_address = Some("alerts@example.com".to_string());
        let notifier = EmailNotifier::new(config).unwrap();
        assert_eq!(
            notifier.from_mailbox().unwrap().email.to_string(),
            "alerts@example.com"
        );
    }

    #[tokio::test]
    async fn test_dispatch_invalid_recipient_is_false() {
        let notifier = EmailNotifier::new(test_config()).unwrap();
        assert!(
            !notifier
                .dispatch("not-an-address", "Widget", "https://shop.example.com/w")
                .await
        );
    }

    #[tokio::test]
    async fn test_dispatch_unreachable_server_is_false() {
        // Port 1 refuses connections; delivery failure must come back as
        // `false`, never as a panic or error.
        let notifier = EmailNotifier::new(test_config()).unwrap();
        assert!(
            !notifier
                .dispatch(
                    "buyer@example.com",
                    "Widget",
                    "https://shop.example.com/w"
                )
                .await
        );
    }
}

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::composite::Composite;
use crate::errors::DeliveryError;

pub const EMAIL_SUBJECT: &str = "Your PhotoBooth Photos!";

/// Outbound mail seam. Only a mock ships with the crate.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError>;
    fn type_name(&self) -> &'static str;
}

/// Pretends to send mail after a fixed delay.
pub struct MockEmailSender {
    delay: Duration,
}

impl MockEmailSender {
    pub fn new(delay: Duration) -> Self {
        MockEmailSender { delay }
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        info!(
            "Sending mock email to {} ({}, {} byte body)",
            to,
            subject,
            html_body.len()
        );
        tokio::time::sleep(self.delay).await;
        info!("Mock email to {} sent", to);
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "Mock Email"
    }
}

/// Accepts `local@domain.tld`: no whitespace, exactly one `@`, and a dot
/// inside the domain with text on both sides.
pub fn validate_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn render_email_html(composites: &[Composite], template_name: &str) -> String {
    let images: String = composites
        .iter()
        .map(|composite| {
            format!(
                r#"<img src="{}" style="max-width: 100%; height: auto; margin: 10px 0;" />"#,
                composite.to_data_url()
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>Your PhotoBooth Photos</title>
  </head>
  <body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #ff6b6b; text-align: center;">{subject}</h1>
    <p style="text-align: center;">Thank you for using our PhotoBooth! Here are your photos:</p>
    <div style="text-align: center;">{images}</div>
    <p style="text-align: center; color: #666; font-size: 14px;">
      Template: {template}<br>
      Date: {date}
    </p>
  </body>
</html>
"#,
        subject = EMAIL_SUBJECT,
        images = images,
        template = escape_html(template_name),
        date = chrono::Local::now().format("%-m/%-d/%Y"),
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub struct EmailAdapter {
    sender: Box<dyn EmailSender>,
}

impl EmailAdapter {
    pub fn new(sender: Box<dyn EmailSender>) -> Self {
        EmailAdapter { sender }
    }

    pub async fn send(
        &self,
        address: &str,
        composites: &[Composite],
        template_name: &str,
    ) -> Result<(), DeliveryError> {
        if !validate_email(address) {
            return Err(DeliveryError::InvalidEmail {
                address: address.to_string(),
            });
        }
        if composites.is_empty() {
            return Err(DeliveryError::NoComposites);
        }

        info!(
            "Emailing {} composite(s) to {} via {}",
            composites.len(),
            address,
            self.sender.type_name()
        );
        let body = render_email_html(composites, template_name);
        self.sender.send(address, EMAIL_SUBJECT, &body).await
    }
}

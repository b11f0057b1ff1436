//! Outbound email: confirmation links, password resets and application
//! receipts.
//!
//! Sending is fire-and-forget from the caller's point of view: when SMTP
//! is not configured the mailer logs and returns Ok, and callers spawn
//! sends off the request path.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send an email-verification message carrying both the link and the
    /// code itself for manual entry. Both routes redeem the same code.
    pub async fn send_verification_email(
        &self,
        to_email: &str,
        code: &str,
        verify_url: &str,
    ) -> Result<()> {
        let subject = "Bekräfta din e-postadress";
        let text = format!(
            "Hej!\n\n\
             Bekräfta din e-postadress genom att klicka på länken:\n{}\n\n\
             Eller ange koden manuellt: {}\n\n\
             Länken är giltig i 24 timmar.\n",
            verify_url, code
        );
        let html = format!(
            "<p>Hej!</p>\
             <p>Bekräfta din e-postadress genom att klicka på länken:<br>\
             <a href=\"{url}\">{url}</a></p>\
             <p>Eller ange koden manuellt: <code>{code}</code></p>\
             <p>Länken är giltig i 24 timmar.</p>",
            url = verify_url,
            code = code
        );
        self.send(to_email, subject, &html, &text).await
    }

    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        code: &str,
        reset_url: &str,
    ) -> Result<()> {
        let subject = "Återställ ditt lösenord";
        let text = format!(
            "Hej!\n\n\
             En återställning av ditt lösenord har begärts.\n\
             Klicka på länken för att välja ett nytt lösenord:\n{}\n\n\
             Eller ange koden manuellt: {}\n\n\
             Om du inte begärde detta kan du bortse från meddelandet.\n",
            reset_url, code
        );
        let html = format!(
            "<p>Hej!</p>\
             <p>En återställning av ditt lösenord har begärts. \
             Klicka på länken för att välja ett nytt lösenord:<br>\
             <a href=\"{url}\">{url}</a></p>\
             <p>Eller ange koden manuellt: <code>{code}</code></p>\
             <p>Om du inte begärde detta kan du bortse från meddelandet.</p>",
            url = reset_url,
            code = code
        );
        self.send(to_email, subject, &html, &text).await
    }

    /// Receipt sent to the parent when an application is submitted.
    pub async fn send_application_receipt(
        &self,
        to_email: &str,
        student_name: &str,
        grade: &str,
        application_year: &str,
    ) -> Result<()> {
        let subject = "Bekräftelse av ansökan";
        let text = format!(
            "Tack för din ansökan!\n\n\
             Vi har mottagit ansökan för {} till årskurs {} för läsåret {}.\n\n\
             Ansökan följs av provsjungningar där eleverna prövas individuellt. \
             Vi återkommer med information om provsjungning.\n",
            student_name, grade, application_year
        );
        let html = format!(
            "<p>Tack för din ansökan!</p>\
             <p>Vi har mottagit ansökan för <strong>{}</strong> till årskurs {} \
             för läsåret {}.</p>\
             <p>Ansökan följs av provsjungningar där eleverna prövas individuellt. \
             Vi återkommer med information om provsjungning.</p>",
            student_name, grade, application_year
        );
        self.send(to_email, subject, &html, &text).await
    }

    /// Send an email with HTML and plain text versions
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping message to {}", to_email);
            return Ok(());
        }

        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!("Sent email to {}", to_email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_mailer_is_a_noop() {
        let mailer = Mailer::new(EmailConfig::default());
        assert!(!mailer.is_enabled());
        // Must not attempt a connection
        mailer
            .send_verification_email("a@example.se", "CODE", "https://x/verify")
            .await
            .unwrap();
    }
}

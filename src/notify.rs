use std::env;

/// Outbound email dispatcher. The transport here is a structured log line;
/// a real SMTP relay plugs in behind `deliver` without touching callers.
/// Dispatch never fails the surrounding request: callers spawn
/// `send_booking_confirmation` after their transaction commits and any
/// delivery failure ends as a warning.
#[derive(Debug, Clone)]
pub struct Mailer {
    from: String,
}

impl Mailer {
    pub fn from_env() -> Self {
        let from = env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@restaurant.local".to_string());
        Self { from }
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            body = %body,
            "email dispatched"
        );
        Ok(())
    }
}

/// Fire-and-forget booking confirmation. Runs on its own task so the
/// booking transaction never waits on mail I/O.
pub fn send_booking_confirmation(mailer: Mailer, to: String, booking_id: i64, table_numbers: Vec<String>) {
    tokio::spawn(async move {
        let subject = format!("Booking #{booking_id} confirmed");
        let body = format!(
            "Your booking #{booking_id} has been confirmed. Assigned tables: {}.",
            table_numbers.join(", ")
        );
        if let Err(err) = mailer.deliver(&to, &subject, &body).await {
            tracing::warn!(error = %err, booking_id, "booking confirmation email failed");
        }
    });
}

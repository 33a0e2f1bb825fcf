//! System prompt template rendering.
//!
//! Supported placeholders: `{app_name}`, `{date}` (today in the configured
//! timezone, `YYYY-MM-DD`), and `{timezone}` (the zone's IANA name).
//! Unknown placeholders are left as they are.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct SystemPrompt {
    template: String,
    app_name: String,
    timezone: Tz,
}

impl SystemPrompt {
    pub fn new(template: impl Into<String>, app_name: impl Into<String>, timezone: Tz) -> Self {
        Self {
            template: template.into(),
            app_name: app_name.into(),
            timezone,
        }
    }

    /// Render the template for a request arriving at `now`.
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let date = now.with_timezone(&self.timezone).format("%Y-%m-%d").to_string();
        self.template
            .replace("{app_name}", &self.app_name)
            .replace("{date}", &date)
            .replace("{timezone}", self.timezone.name())
    }
}

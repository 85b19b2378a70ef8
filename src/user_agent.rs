//! User-Agent identification for outbound requests.
//!
//! Rate-limited services ask clients to identify the application and a way to
//! contact its maintainer. The header names the embedding application first
//! and this library second.

use serde::Deserialize;

/// Library token appended to every User-Agent.
fn library_token() -> String {
    format!("wsgate/{}", env!("CARGO_PKG_VERSION"))
}

/// Application identity sent in the User-Agent header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserAgent {
    app: Option<String>,
    version: Option<String>,
    contact: Option<String>,
}

impl UserAgent {
    /// Identifies an application by name and version.
    pub fn new(app: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            app: Some(app.into()),
            version: Some(version.into()),
            contact: None,
        }
    }

    /// Adds a contact (URL or e-mail address).
    #[must_use]
    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    /// Renders the header value.
    ///
    /// # Examples
    ///
    /// ```
    /// use wsgate_core::UserAgent;
    ///
    /// let ua = UserAgent::new("tagger", "2.1").with_contact("me@example.org");
    /// assert!(ua.header_value().starts_with("tagger/2.1 wsgate/"));
    /// assert!(ua.header_value().ends_with("( me@example.org )"));
    /// ```
    #[must_use]
    pub fn header_value(&self) -> String {
        let mut value = match (&self.app, &self.version) {
            (Some(app), Some(version)) => format!("{app}/{version} {}", library_token()),
            (Some(app), None) => format!("{app} {}", library_token()),
            (None, _) => library_token(),
        };
        if let Some(contact) = &self.contact {
            value.push_str(&format!(" ( {contact} )"));
        }
        value
    }

    /// Whether any part contains characters that cannot appear in a header.
    pub(crate) fn has_control_characters(&self) -> bool {
        [&self.app, &self.version, &self.contact]
            .into_iter()
            .flatten()
            .any(|part| part.chars().any(char::is_control))
    }
}

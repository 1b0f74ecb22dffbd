use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Delegated OAuth access material for the mail provider
///
/// The serialized form follows the "authorized user" token file that Google
/// client libraries write, so an existing `token.json` can be reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token", alias = "access_token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// `None` means the expiry is unknown and the token is assumed usable
    #[serde(default, with = "deserializers::lenient_expiry")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expiry: None,
            scopes: BTreeSet::new(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Valid iff the access token is non-empty and expiry is unknown or strictly in the future
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expiry.map_or(true, |expiry| expiry > now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Apply a refresh response in place
    ///
    /// The refresh token and scopes are kept unless the grant replaces them.
    pub fn apply_grant(&mut self, grant: TokenGrant, now: DateTime<Utc>) {
        self.expiry = grant.expiry_from(now);
        self.access_token = grant.access_token;
        if let Some(rotated) = grant.refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(rotated);
        }
        if let Some(scope) = grant.scope {
            let granted: BTreeSet<String> = scope.split_whitespace().map(str::to_string).collect();
            if !granted.is_empty() {
                self.scopes = granted;
            }
        }
    }
}

/// Successful response of the OAuth token endpoint for a refresh grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    /// Absolute expiry `expires_in` seconds after `now`; `None` when absent or unrepresentable
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl ClassificationRequest {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Subject and body joined by a single space, the input of the rule engine
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}

/// Category, status and confidence for one message
///
/// Category and status are plain strings: values coming back from the remote
/// classifier are passed through as-is and may fall outside [`EmailCategory`]
/// and [`EmailStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub status: String,
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(category: EmailCategory, status: EmailStatus, confidence: f64) -> Self {
        Self {
            category: category.as_str().to_string(),
            status: status.as_str().to_string(),
            confidence,
        }
    }

    /// True when category and status belong to the fixed sets and confidence is in [0, 1]
    pub fn is_within_known_sets(&self) -> bool {
        EmailCategory::from_label(&self.category).is_some()
            && EmailStatus::from_label(&self.status).is_some()
            && (0.0..=1.0).contains(&self.confidence)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSummary {
    pub subject: String,
    pub sender: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailCategory {
    Internships,
    JobOffers,
    Scholarships,
    Events,
    ExamsAndResults,
    FeeAndPayment,
    Spam,
    Inbox,
}

impl EmailCategory {
    pub const ALL: [EmailCategory; 8] = [
        EmailCategory::Internships,
        EmailCategory::JobOffers,
        EmailCategory::Scholarships,
        EmailCategory::Events,
        EmailCategory::ExamsAndResults,
        EmailCategory::FeeAndPayment,
        EmailCategory::Spam,
        EmailCategory::Inbox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailCategory::Internships => "Internships",
            EmailCategory::JobOffers => "Job Offers",
            EmailCategory::Scholarships => "Scholarships",
            EmailCategory::Events => "Events",
            EmailCategory::ExamsAndResults => "Exams & Results",
            EmailCategory::FeeAndPayment => "Fee & Payment",
            EmailCategory::Spam => "Spam",
            EmailCategory::Inbox => "Inbox",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailStatus {
    Accepted,
    Rejected,
    Pending,
    Spam,
    Paid,
    Unpaid,
    Upcoming,
    Cancelled,
}

impl EmailStatus {
    pub const ALL: [EmailStatus; 8] = [
        EmailStatus::Accepted,
        EmailStatus::Rejected,
        EmailStatus::Pending,
        EmailStatus::Spam,
        EmailStatus::Paid,
        EmailStatus::Unpaid,
        EmailStatus::Upcoming,
        EmailStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Accepted => "accepted",
            EmailStatus::Rejected => "rejected",
            EmailStatus::Pending => "pending",
            EmailStatus::Spam => "spam",
            EmailStatus::Paid => "paid",
            EmailStatus::Unpaid => "unpaid",
            EmailStatus::Upcoming => "upcoming",
            EmailStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

/// Custom (de)serializers for persisted token fields
pub mod deserializers {
    /// Expiry timestamps as written by different OAuth tooling
    ///
    /// Accepts RFC 3339 (`2024-05-01T12:00:00Z`) and the naive ISO form without an
    /// offset (`2024-05-01T12:00:00.123456`), which is read as UTC.
    pub mod lenient_expiry {
        use chrono::{DateTime, NaiveDateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let opt: Option<String> = Option::deserialize(deserializer)?;
            match opt.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(s) => {
                    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                        return Ok(Some(dt.with_timezone(&Utc)));
                    }
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .map(|naive| Some(naive.and_utc()))
                        .map_err(de::Error::custom)
                }
            }
        }
    }
}

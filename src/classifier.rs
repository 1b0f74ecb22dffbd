//! Deterministic keyword classification used when the remote classifier is unavailable

use crate::models::{ClassificationResult, EmailCategory, EmailStatus};

/// Confidence reported when a keyword rule matched
pub const RULE_MATCH_CONFIDENCE: f64 = 0.8;

/// Confidence reported when nothing matched and the message lands in the inbox
pub const NO_MATCH_CONFIDENCE: f64 = 0.6;

/// Ordered keyword table. Earlier rows win when text matches several categories.
pub const RULES: &[(EmailCategory, &[&str])] = &[
    (
        EmailCategory::Internships,
        &["internship", "intern", "summer intern", "winter intern"],
    ),
    (
        EmailCategory::JobOffers,
        &["job offer", "offer letter", "position", "hiring", "opportunity"],
    ),
    (
        EmailCategory::Scholarships,
        &["scholarship", "fellowship", "grant", "tuition waiver"],
    ),
    (
        EmailCategory::Events,
        &["event", "webinar", "workshop", "seminar", "conference"],
    ),
    (
        EmailCategory::ExamsAndResults,
        &["exam", "result", "marks", "grade", "assessment"],
    ),
    (
        EmailCategory::FeeAndPayment,
        &["fee", "payment", "invoice", "bill", "tuition"],
    ),
    (
        EmailCategory::Spam,
        &["unsubscribe", "winner", "lottery", "prize", "click here"],
    ),
];

/// Classify free text with the keyword table
///
/// Matching is a case-insensitive substring search, so "intern" also hits
/// "international". Status is always `pending`.
pub fn classify_by_rules(text: &str) -> ClassificationResult {
    let text = text.to_lowercase();

    match matching_category(&text) {
        Some(category) => {
            ClassificationResult::new(category, EmailStatus::Pending, RULE_MATCH_CONFIDENCE)
        }
        None => ClassificationResult::new(
            EmailCategory::Inbox,
            EmailStatus::Pending,
            NO_MATCH_CONFIDENCE,
        ),
    }
}

/// First category whose keyword list hits the (already lowercased) text
fn matching_category(text: &str) -> Option<EmailCategory> {
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| text.contains(keyword)))
        .map(|(category, _)| *category)
}

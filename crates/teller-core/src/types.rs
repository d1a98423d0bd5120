use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// How the user's input arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Typed text.
    Text,
    /// Voice, already transcribed by the speech-to-text collaborator.
    Voice,
}

impl Modality {
    /// Stable string form used for storage and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Voice => "voice",
        }
    }

    /// Parse the stable string form back into a modality.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Modality::Text),
            "voice" => Some(Modality::Voice),
            _ => None,
        }
    }
}

/// Banking intent classified from a user query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AccountBalance,
    TransactionHistory,
    TransferMoney,
    CardIssues,
    LoanInquiry,
    #[default]
    GeneralInquiry,
}

impl Intent {
    /// Stable string form used for storage and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::AccountBalance => "account_balance",
            Intent::TransactionHistory => "transaction_history",
            Intent::TransferMoney => "transfer_money",
            Intent::CardIssues => "card_issues",
            Intent::LoanInquiry => "loan_inquiry",
            Intent::GeneralInquiry => "general_inquiry",
        }
    }

    /// Parse the stable string form back into an intent.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "account_balance" => Some(Intent::AccountBalance),
            "transaction_history" => Some(Intent::TransactionHistory),
            "transfer_money" => Some(Intent::TransferMoney),
            "card_issues" => Some(Intent::CardIssues),
            "loan_inquiry" => Some(Intent::LoanInquiry),
            "general_inquiry" => Some(Intent::GeneralInquiry),
            _ => None,
        }
    }
}

/// Coarse sentiment of a user query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Stable string form used for storage and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// Parse the stable string form back into a sentiment.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

// =============================================================================
// Entity Structs (defined in teller-core for shared use)
// =============================================================================

/// A canonical user query, produced once per request by normalization.
///
/// Immutable after construction. `normalized_text` is what backends see;
/// `raw_text` is kept for the stored turn record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub session_id: Uuid,
    pub raw_text: String,
    pub modality: Modality,
    pub normalized_text: String,
    pub received_at: DateTime<Utc>,
}

/// A validated response, produced once per request.
///
/// `sanitized` is always true on the success path; a response never leaves
/// the validator unsanitized. `truncated` marks output cut to the
/// configured length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    pub source_backend: String,
    pub latency_ms: u64,
    pub sanitized: bool,
    pub truncated: bool,
}

/// One completed (query, response) exchange within a conversation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub query: Query,
    pub response: Response,
    pub intent: Intent,
    pub sentiment: Sentiment,
}

// =============================================================================
// Tests
// =============================================================================

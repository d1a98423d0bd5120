//! Intent and sentiment classification for completed turns.
//!
//! Keyword-driven, not model-driven: classification labels stored turns
//! for analytics and never changes how a query is answered.

use regex::Regex;
use std::sync::LazyLock;

use teller_core::types::{Intent, Sentiment};

// =============================================================================
// Compiled regex sets (compiled once, reused across calls)
// =============================================================================

struct IntentPatterns {
    card_issues: Vec<Regex>,
    transfer_money: Vec<Regex>,
    loan_inquiry: Vec<Regex>,
    account_balance: Vec<Regex>,
    transaction_history: Vec<Regex>,
}

static INTENT_PATTERNS: LazyLock<IntentPatterns> = LazyLock::new(|| {
    let mk = |pats: &[&str]| -> Vec<Regex> {
        pats.iter()
            .map(|p| Regex::new(p).expect("Invalid intent regex"))
            .collect()
    };

    IntentPatterns {
        // Card patterns (checked first so "card" beats the balance
        // fallback in "balance on my card")
        card_issues: mk(&[
            r"(?i)\bcard\b",
            r"(?i)\bpin\b",
            r"(?i)\bcvv\b",
            r"(?i)\bcontactless\b",
        ]),
        transfer_money: mk(&[
            r"(?i)\btransfer\b",
            r"(?i)\bsend\s+\S+\s+to\b",
            r"(?i)\bwire\b",
            r"(?i)\bmove\s+money\b",
            r"(?i)\bpay(?:ment)?\b",
        ]),
        loan_inquiry: mk(&[
            r"(?i)\bloan\b",
            r"(?i)\bmortgage\b",
            r"(?i)\bborrow\b",
            r"(?i)\binterest\s+rate\b",
            r"(?i)\brefinanc",
            r"(?i)\bapr\b",
        ]),
        account_balance: mk(&[
            r"(?i)\bbalance\b",
            r"(?i)\bavailable\s+funds\b",
            r"(?i)\bhow\s+much\s+(?:money\s+)?(?:do\s+i\s+have|is\s+in)\b",
        ]),
        transaction_history: mk(&[
            r"(?i)\btransactions?\b",
            r"(?i)\bstatement\b",
            r"(?i)\bspending\b",
            r"(?i)\bcharges\b",
            r"(?i)\brecent\s+(?:payments|purchases)\b",
        ]),
    }
});

static POSITIVE_WORDS: &[&str] = &[
    "thanks",
    "thank",
    "great",
    "perfect",
    "awesome",
    "good",
    "excellent",
    "wonderful",
    "helpful",
    "appreciate",
    "love",
];

static NEGATIVE_WORDS: &[&str] = &[
    "angry",
    "annoyed",
    "bad",
    "complaint",
    "frustrated",
    "hate",
    "horrible",
    "problem",
    "ridiculous",
    "terrible",
    "unacceptable",
    "upset",
    "useless",
    "worst",
    "wrong",
];

static POSITIVE_RE: LazyLock<Regex> = LazyLock::new(|| word_set_regex(POSITIVE_WORDS));
static NEGATIVE_RE: LazyLock<Regex> = LazyLock::new(|| word_set_regex(NEGATIVE_WORDS));

fn word_set_regex(words: &[&str]) -> Regex {
    let alts: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alts.join("|"))).expect("Invalid sentiment regex")
}

// =============================================================================
// Classification
// =============================================================================

/// Classify the banking intent of a normalized query.
///
/// Categories are checked in a fixed priority order; the first match
/// wins and anything unmatched is a general inquiry.
pub fn classify_intent(text: &str) -> Intent {
    let p = &*INTENT_PATTERNS;
    if p.card_issues.iter().any(|re| re.is_match(text)) {
        Intent::CardIssues
    } else if p.transfer_money.iter().any(|re| re.is_match(text)) {
        Intent::TransferMoney
    } else if p.loan_inquiry.iter().any(|re| re.is_match(text)) {
        Intent::LoanInquiry
    } else if p.account_balance.iter().any(|re| re.is_match(text)) {
        Intent::AccountBalance
    } else if p.transaction_history.iter().any(|re| re.is_match(text)) {
        Intent::TransactionHistory
    } else {
        Intent::GeneralInquiry
    }
}

/// Classify the coarse sentiment of a normalized query by counting
/// marker words. Ties, including no markers at all, land on neutral.
pub fn classify_sentiment(text: &str) -> Sentiment {
    let positive = POSITIVE_RE.find_iter(text).count();
    let negative = NEGATIVE_RE.find_iter(text).count();
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Intent --

    #[test]
    fn test_card_issues() {
        assert_eq!(classify_intent("my card was swallowed by the atm"), Intent::CardIssues);
        assert_eq!(classify_intent("I forgot my PIN"), Intent::CardIssues);
    }

    #[test]
    fn test_transfer_money() {
        assert_eq!(classify_intent("transfer 50 to savings"), Intent::TransferMoney);
        assert_eq!(classify_intent("send fifty to my landlord"), Intent::TransferMoney);
        assert_eq!(classify_intent("schedule a payment for friday"), Intent::TransferMoney);
    }

    #[test]
    fn test_loan_inquiry() {
        assert_eq!(classify_intent("what mortgage rates do you offer"), Intent::LoanInquiry);
        assert_eq!(classify_intent("can I borrow 2000"), Intent::LoanInquiry);
    }

    #[test]
    fn test_account_balance() {
        assert_eq!(classify_intent("what is my balance"), Intent::AccountBalance);
        assert_eq!(
            classify_intent("how much money do I have right now"),
            Intent::AccountBalance
        );
    }

    #[test]
    fn test_transaction_history() {
        assert_eq!(
            classify_intent("show me last month's transactions"),
            Intent::TransactionHistory
        );
        assert_eq!(classify_intent("I need a statement"), Intent::TransactionHistory);
    }

    #[test]
    fn test_general_fallback() {
        assert_eq!(classify_intent("hello there"), Intent::GeneralInquiry);
        assert_eq!(classify_intent("what are your opening hours"), Intent::GeneralInquiry);
    }

    #[test]
    fn test_card_beats_balance() {
        assert_eq!(
            classify_intent("what's the balance on my credit card"),
            Intent::CardIssues
        );
    }

    #[test]
    fn test_intent_is_case_insensitive() {
        assert_eq!(classify_intent("TRANSFER EVERYTHING"), Intent::TransferMoney);
    }

    // -- Sentiment --

    #[test]
    fn test_positive_sentiment() {
        assert_eq!(classify_sentiment("thanks, that was helpful"), Sentiment::Positive);
    }

    #[test]
    fn test_negative_sentiment() {
        assert_eq!(
            classify_sentiment("this is terrible, my transfer is still wrong"),
            Sentiment::Negative
        );
    }

    #[test]
    fn test_neutral_without_markers() {
        assert_eq!(classify_sentiment("what is my balance"), Sentiment::Neutral);
    }

    #[test]
    fn test_tie_is_neutral() {
        assert_eq!(classify_sentiment("thanks for nothing, this is terrible"), Sentiment::Neutral);
    }

    #[test]
    fn test_sentiment_is_case_insensitive() {
        assert_eq!(classify_sentiment("GREAT service"), Sentiment::Positive);
    }
}

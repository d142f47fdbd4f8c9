//! Ledger event classification.
//!
//! [`classify`] is a pure function from a raw feed message to a domain event
//! kind. Anything that is not a successful, in-currency Payment or TrustSet
//! comes back as [`EventKind::Ignored`] with a reason; classification
//! failures never propagate as errors.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::constants::{
    LEDGER_EPOCH_OFFSET, SUCCESS_RESULT_CODE, TXN_TYPE_PAYMENT, TXN_TYPE_TRUST_SET,
};
use crate::types::{Address, TxnMeta};

/// A raw transaction message as delivered by the ledger feed.
///
/// Fields the feed may omit are `Option`; the classifier decides what absence
/// means instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLedgerMessage {
    /// Stream status string (informational).
    #[serde(default)]
    pub status: Option<String>,
    /// Index of the ledger the transaction settled in.
    #[serde(default)]
    pub ledger_index: Option<u64>,
    /// Hash of that ledger.
    #[serde(default)]
    pub ledger_hash: Option<String>,
    /// Transaction metadata (carries the result code).
    #[serde(default)]
    pub meta: Option<RawMeta>,
    /// The transaction payload itself.
    #[serde(default)]
    pub transaction: Option<RawTransaction>,
}

/// Transaction metadata from the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMeta {
    /// Engine result code, e.g. `tesSUCCESS`.
    #[serde(rename = "TransactionResult")]
    pub transaction_result: String,
}

/// The transaction payload of a feed message.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    /// Transaction type string (`TrustSet`, `Payment`, ...).
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    /// Initiating account.
    #[serde(rename = "Account")]
    pub account: String,
    /// Payment destination (Payment only).
    #[serde(rename = "Destination", default)]
    pub destination: Option<String>,
    /// Payment amount: a string for the native asset, an object for issued
    /// currencies (Payment only).
    #[serde(rename = "Amount", default)]
    pub amount: Option<RawAmount>,
    /// New trust-line limit (TrustSet only).
    #[serde(rename = "LimitAmount", default)]
    pub limit_amount: Option<RawIssuedAmount>,
    /// Attached memos, hex-encoded.
    #[serde(rename = "Memos", default)]
    pub memos: Option<Vec<RawMemoWrapper>>,
    /// Transaction hash.
    #[serde(default)]
    pub hash: Option<String>,
    /// Settlement time in seconds since the ledger epoch.
    #[serde(default)]
    pub date: Option<i64>,
}

/// A payment amount, either native (plain string) or issued currency.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    /// Issued-currency amount.
    Issued(RawIssuedAmount),
    /// Native-asset amount (out of scope for the trust graph).
    Native(String),
}

/// An issued-currency amount `{ currency, issuer, value }`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIssuedAmount {
    /// 3-character currency code.
    pub currency: String,
    /// Issuing account.
    pub issuer: String,
    /// Decimal value as a string.
    pub value: String,
}

/// Wrapper level of the feed's `Memos` array.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMemoWrapper {
    /// The memo object.
    #[serde(rename = "Memo")]
    pub memo: RawMemo,
}

/// A single memo, fields hex-encoded by the network.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMemo {
    /// Memo type tag.
    #[serde(rename = "MemoType", default)]
    pub memo_type: Option<String>,
    /// Memo payload.
    #[serde(rename = "MemoData", default)]
    pub memo_data: Option<String>,
}

impl RawTransaction {
    /// Decode the first memo's payload to UTF-8 text, if present.
    ///
    /// Undecodable memos are treated as absent; a memo must never block
    /// processing of the transaction that carries it.
    pub fn memo_text(&self) -> Option<String> {
        let hex_data = self
            .memos
            .as_ref()?
            .first()?
            .memo
            .memo_data
            .as_deref()?;
        let bytes = hex::decode(hex_data).ok()?;
        String::from_utf8(bytes).ok()
    }
}

/// Why a message was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No transaction payload or no metadata on the message.
    MissingPayload,
    /// Result code was not `tesSUCCESS`.
    NotSuccessful(String),
    /// Currency code did not match the configured in-scope currency.
    CurrencyMismatch(String),
    /// Limit or amount value failed to parse as a non-negative decimal.
    MalformedAmount(String),
    /// Transaction type the graph does not track.
    UnsupportedType(String),
    /// A field required for this transaction type was missing.
    MissingField(&'static str),
}

/// An accepted TrustSet event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustSetEvent {
    /// TrustSet initiator (edge source).
    pub source: Address,
    /// Limit counterparty (edge target).
    pub target: Address,
    /// The new limit; 0 deletes the edge.
    pub new_limit: Decimal,
    /// Ledger coordinates of the settling transaction.
    pub meta: TxnMeta,
}

/// An accepted in-currency payment (bookkeeping only, no graph mutation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Paying account.
    pub source: Address,
    /// Receiving account.
    pub destination: Address,
    /// Payment amount.
    pub amount: Decimal,
    /// Ledger coordinates of the settling transaction.
    pub meta: TxnMeta,
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Discarded without side effects.
    Ignored(IgnoreReason),
    /// Successful in-currency payment.
    Payment(PaymentEvent),
    /// Successful in-currency trust-line mutation.
    TrustSet(TrustSetEvent),
}

/// Classify a raw feed message against the configured in-scope currency.
pub fn classify(msg: &RawLedgerMessage, currency: &str) -> EventKind {
    let Some(meta) = &msg.meta else {
        return EventKind::Ignored(IgnoreReason::MissingPayload);
    };
    let Some(txn) = &msg.transaction else {
        return EventKind::Ignored(IgnoreReason::MissingPayload);
    };

    if meta.transaction_result != SUCCESS_RESULT_CODE {
        return EventKind::Ignored(IgnoreReason::NotSuccessful(
            meta.transaction_result.clone(),
        ));
    }

    match txn.transaction_type.as_str() {
        TXN_TYPE_TRUST_SET => classify_trust_set(msg, txn, currency),
        TXN_TYPE_PAYMENT => classify_payment(msg, txn, currency),
        other => EventKind::Ignored(IgnoreReason::UnsupportedType(other.to_string())),
    }
}

fn classify_trust_set(
    msg: &RawLedgerMessage,
    txn: &RawTransaction,
    currency: &str,
) -> EventKind {
    let Some(limit) = &txn.limit_amount else {
        return EventKind::Ignored(IgnoreReason::MissingField("LimitAmount"));
    };

    if limit.currency != currency {
        return EventKind::Ignored(IgnoreReason::CurrencyMismatch(limit.currency.clone()));
    }

    let new_limit = match parse_amount(&limit.value) {
        Ok(v) => v,
        Err(reason) => return EventKind::Ignored(reason),
    };

    let meta = match txn_meta(msg, txn) {
        Ok(meta) => meta,
        Err(reason) => return EventKind::Ignored(reason),
    };

    EventKind::TrustSet(TrustSetEvent {
        source: Address::from(txn.account.as_str()),
        target: Address::from(limit.issuer.as_str()),
        new_limit,
        meta,
    })
}

fn classify_payment(msg: &RawLedgerMessage, txn: &RawTransaction, currency: &str) -> EventKind {
    let Some(destination) = &txn.destination else {
        return EventKind::Ignored(IgnoreReason::MissingField("Destination"));
    };

    let issued = match &txn.amount {
        Some(RawAmount::Issued(issued)) => issued,
        // Native-asset payments carry no in-scope currency.
        Some(RawAmount::Native(_)) => {
            return EventKind::Ignored(IgnoreReason::CurrencyMismatch("native".to_string()))
        }
        None => return EventKind::Ignored(IgnoreReason::MissingField("Amount")),
    };

    if issued.currency != currency {
        return EventKind::Ignored(IgnoreReason::CurrencyMismatch(issued.currency.clone()));
    }

    let amount = match parse_amount(&issued.value) {
        Ok(v) => v,
        Err(reason) => return EventKind::Ignored(reason),
    };

    let meta = match txn_meta(msg, txn) {
        Ok(meta) => meta,
        Err(reason) => return EventKind::Ignored(reason),
    };

    EventKind::Payment(PaymentEvent {
        source: Address::from(txn.account.as_str()),
        destination: Address::from(destination.as_str()),
        amount,
        meta,
    })
}

/// Parse a feed amount string as an exact, non-negative decimal.
fn parse_amount(value: &str) -> Result<Decimal, IgnoreReason> {
    match Decimal::from_str(value) {
        Ok(v) if v >= Decimal::ZERO => Ok(v),
        Ok(_) => Err(IgnoreReason::MalformedAmount(format!(
            "negative amount: {value}"
        ))),
        Err(_) => Err(IgnoreReason::MalformedAmount(value.to_string())),
    }
}

fn txn_meta(msg: &RawLedgerMessage, txn: &RawTransaction) -> Result<TxnMeta, IgnoreReason> {
    let ledger_index = msg
        .ledger_index
        .ok_or(IgnoreReason::MissingField("ledger_index"))?;
    let ledger_hash = msg
        .ledger_hash
        .clone()
        .ok_or(IgnoreReason::MissingField("ledger_hash"))?;
    let txn_hash = txn.hash.clone().ok_or(IgnoreReason::MissingField("hash"))?;
    let date = txn.date.ok_or(IgnoreReason::MissingField("date"))?;

    Ok(TxnMeta {
        ledger_index,
        ledger_hash,
        txn_hash,
        txn_date: LEDGER_EPOCH_OFFSET + date,
        memo: txn.memo_text(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const CURRENCY: &str = "WFI";

    fn trust_set_msg(result: &str, currency: &str, value: &str) -> RawLedgerMessage {
        serde_json::from_value(json!({
            "status": "closed",
            "ledger_index": 8_692_432,
            "ledger_hash": "F2C8A3D1",
            "meta": { "TransactionResult": result },
            "transaction": {
                "TransactionType": "TrustSet",
                "Account": "rSourceAccount",
                "LimitAmount": {
                    "currency": currency,
                    "issuer": "rTargetIssuer",
                    "value": value
                },
                "hash": "DEADBEEF01",
                "date": 489_081_600_i64
            }
        }))
        .unwrap()
    }

    #[test]
    fn accepts_in_currency_trust_set() {
        let msg = trust_set_msg("tesSUCCESS", CURRENCY, "100");
        let EventKind::TrustSet(ev) = classify(&msg, CURRENCY) else {
            panic!("expected TrustSet");
        };
        assert_eq!(ev.source, Address::from("rSourceAccount"));
        assert_eq!(ev.target, Address::from("rTargetIssuer"));
        assert_eq!(ev.new_limit, dec!(100));
        assert_eq!(ev.meta.ledger_index, 8_692_432);
        assert_eq!(ev.meta.txn_hash, "DEADBEEF01");
        // Ledger-epoch date shifted to Unix seconds.
        assert_eq!(ev.meta.txn_date, 946_684_800 + 489_081_600);
    }

    #[test]
    fn rejects_unsuccessful_result_code() {
        let msg = trust_set_msg("tecPATH_DRY", CURRENCY, "100");
        assert_eq!(
            classify(&msg, CURRENCY),
            EventKind::Ignored(IgnoreReason::NotSuccessful("tecPATH_DRY".to_string()))
        );
    }

    #[test]
    fn rejects_wrong_currency() {
        let msg = trust_set_msg("tesSUCCESS", "USD", "100");
        assert_eq!(
            classify(&msg, CURRENCY),
            EventKind::Ignored(IgnoreReason::CurrencyMismatch("USD".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_and_negative_amounts() {
        let msg = trust_set_msg("tesSUCCESS", CURRENCY, "not-a-number");
        assert!(matches!(
            classify(&msg, CURRENCY),
            EventKind::Ignored(IgnoreReason::MalformedAmount(_))
        ));

        let msg = trust_set_msg("tesSUCCESS", CURRENCY, "-5");
        assert!(matches!(
            classify(&msg, CURRENCY),
            EventKind::Ignored(IgnoreReason::MalformedAmount(_))
        ));
    }

    #[test]
    fn rejects_missing_payload() {
        let msg: RawLedgerMessage = serde_json::from_value(json!({ "status": "closed" })).unwrap();
        assert_eq!(
            classify(&msg, CURRENCY),
            EventKind::Ignored(IgnoreReason::MissingPayload)
        );
    }

    #[test]
    fn zero_limit_classifies_as_trust_set() {
        // Deletion is the store's decision, not the classifier's.
        let msg = trust_set_msg("tesSUCCESS", CURRENCY, "0");
        assert!(matches!(classify(&msg, CURRENCY), EventKind::TrustSet(ev) if ev.new_limit == Decimal::ZERO));
    }

    #[test]
    fn classifies_issued_payment_and_ignores_native() {
        let issued: RawLedgerMessage = serde_json::from_value(json!({
            "ledger_index": 1, "ledger_hash": "AB",
            "meta": { "TransactionResult": "tesSUCCESS" },
            "transaction": {
                "TransactionType": "Payment",
                "Account": "rPayer",
                "Destination": "rPayee",
                "Amount": { "currency": "WFI", "issuer": "rPayee", "value": "12.5" },
                "hash": "CAFE02", "date": 1000
            }
        }))
        .unwrap();
        let EventKind::Payment(ev) = classify(&issued, CURRENCY) else {
            panic!("expected Payment");
        };
        assert_eq!(ev.amount, dec!(12.5));
        assert_eq!(ev.destination, Address::from("rPayee"));

        let native: RawLedgerMessage = serde_json::from_value(json!({
            "ledger_index": 1, "ledger_hash": "AB",
            "meta": { "TransactionResult": "tesSUCCESS" },
            "transaction": {
                "TransactionType": "Payment",
                "Account": "rPayer",
                "Destination": "rPayee",
                "Amount": "1000000",
                "hash": "CAFE03", "date": 1000
            }
        }))
        .unwrap();
        assert!(matches!(
            classify(&native, CURRENCY),
            EventKind::Ignored(IgnoreReason::CurrencyMismatch(_))
        ));
    }

    #[test]
    fn ignores_unsupported_transaction_types() {
        let msg: RawLedgerMessage = serde_json::from_value(json!({
            "ledger_index": 1, "ledger_hash": "AB",
            "meta": { "TransactionResult": "tesSUCCESS" },
            "transaction": {
                "TransactionType": "OfferCreate",
                "Account": "rTrader",
                "hash": "CAFE04", "date": 1000
            }
        }))
        .unwrap();
        assert_eq!(
            classify(&msg, CURRENCY),
            EventKind::Ignored(IgnoreReason::UnsupportedType("OfferCreate".to_string()))
        );
    }

    #[test]
    fn memo_text_decodes_hex_payload() {
        let msg: RawLedgerMessage = serde_json::from_value(json!({
            "ledger_index": 1, "ledger_hash": "AB",
            "meta": { "TransactionResult": "tesSUCCESS" },
            "transaction": {
                "TransactionType": "TrustSet",
                "Account": "rSource",
                "LimitAmount": { "currency": "WFI", "issuer": "rTarget", "value": "10" },
                "Memos": [ { "Memo": { "MemoData": hex::encode("thanks for the eggs") } } ],
                "hash": "CAFE05", "date": 1000
            }
        }))
        .unwrap();
        let EventKind::TrustSet(ev) = classify(&msg, CURRENCY) else {
            panic!("expected TrustSet");
        };
        assert_eq!(ev.meta.memo.as_deref(), Some("thanks for the eggs"));
    }
}

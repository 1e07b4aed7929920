//! Status resolution
//!
//! Maps a recorded gateway response, and the posting made from it if any, to
//! the canonical status the host billing system sees.

use crate::types::{
    GatewayResponse, PaymentStatus, PostedTransaction, ResolvedStatus, COMPLETE_STATUS,
    PENDING_STATUS,
};

/// Resolve the canonical status of a gateway response
///
/// Rules, first match wins:
/// 1. successful call with a settlement hash, or still `pending` => `Pending`
/// 2. successful call reported `complete` => `Processed`
/// 3. anything else => `Error`
///
/// A hash means the transfer went on-chain, so it stays `Pending` even once the
/// gateway calls it complete.
pub fn resolve(
    response: &GatewayResponse,
    transaction: Option<&PostedTransaction>,
) -> ResolvedStatus {
    let status = status_of(response);

    let gateway_error = response
        .gateway_status
        .clone()
        .or_else(|| response.message.clone());

    match transaction {
        Some(tx) => ResolvedStatus {
            api_call: response.api_call,
            local_payment_id: response.local_payment_id.clone(),
            status,
            gateway_error,
            created_date: tx.created_at,
            effective_date: response.gateway_created_at,
            amount: tx.processed_amount_minor_units,
            currency: tx.processed_currency.clone(),
            first_reference_id: response.gateway_hash.clone(),
            second_reference_id: response.gateway_txn_id.clone(),
        },
        None => ResolvedStatus {
            api_call: response.api_call,
            local_payment_id: response.local_payment_id.clone(),
            status,
            gateway_error,
            created_date: response.created_at,
            effective_date: response.gateway_created_at,
            amount: None,
            currency: None,
            first_reference_id: None,
            second_reference_id: None,
        },
    }
}

fn status_of(response: &GatewayResponse) -> PaymentStatus {
    if !response.success {
        return PaymentStatus::Error;
    }

    let gateway_status = response.gateway_status.as_deref();
    if response.gateway_hash.is_some() || gateway_status == Some(PENDING_STATUS) {
        PaymentStatus::Pending
    } else if gateway_status == Some(COMPLETE_STATUS) {
        PaymentStatus::Processed
    } else {
        PaymentStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiCall, Party};
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;

    fn response(success: bool, status: Option<&str>, hash: Option<&str>) -> GatewayResponse {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        GatewayResponse {
            id: 1,
            api_call: ApiCall::Charge,
            local_payment_id: Some("p1".to_string()),
            gateway_txn_id: Some("501a1791f8182b2071000087".to_string()),
            gateway_hash: hash.map(str::to_string),
            gateway_created_at: DateTime::parse_from_rfc3339("2012-08-01T23:00:49-07:00").ok(),
            gateway_status: status.map(str::to_string),
            gateway_request: None,
            gateway_notes: None,
            processed_amount_minor_units: Some(-1_000_000),
            processed_currency: Some("BTC".to_string()),
            sender: Party::default(),
            recipient: Party::default(),
            recipient_address: None,
            message: None,
            success,
            created_at: created,
            updated_at: created,
        }
    }

    fn posting() -> PostedTransaction {
        PostedTransaction {
            id: 7,
            gateway_response_id: 1,
            api_call: ApiCall::Charge,
            local_payment_id: "p1".to_string(),
            local_method_id: "pm-1".to_string(),
            requested_amount_minor_units: 1_000_000,
            requested_currency: "BTC".to_string(),
            processed_amount_minor_units: Some(1_000_000),
            processed_currency: Some("BTC".to_string()),
            gateway_txn_id: "501a1791f8182b2071000087".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    #[rstest]
    #[case::pending_with_hash(true, Some("pending"), Some("9d6a"), PaymentStatus::Pending)]
    #[case::pending_without_hash(true, Some("pending"), None, PaymentStatus::Pending)]
    #[case::complete_with_hash(true, Some("complete"), Some("9d6a"), PaymentStatus::Pending)]
    #[case::complete_without_hash(true, Some("complete"), None, PaymentStatus::Processed)]
    #[case::unknown_status(true, Some("canceled"), None, PaymentStatus::Error)]
    #[case::no_status(true, None, None, PaymentStatus::Error)]
    #[case::hash_but_no_status(true, None, Some("9d6a"), PaymentStatus::Pending)]
    #[case::failed_call(false, Some("pending"), Some("9d6a"), PaymentStatus::Error)]
    fn test_status_tie_break(
        #[case] success: bool,
        #[case] status: Option<&str>,
        #[case] hash: Option<&str>,
        #[case] expected: PaymentStatus,
    ) {
        let resolved = resolve(&response(success, status, hash), Some(&posting()));
        assert_eq!(resolved.status, expected);
    }

    #[test]
    fn test_resolve_with_posting() {
        let response = response(true, Some("complete"), Some("9d6a"));
        let resolved = resolve(&response, Some(&posting()));

        assert_eq!(resolved.status, PaymentStatus::Pending);
        assert_eq!(resolved.gateway_error.as_deref(), Some("complete"));
        assert_eq!(resolved.amount, Some(1_000_000));
        assert_eq!(resolved.currency.as_deref(), Some("BTC"));
        assert_eq!(resolved.created_date, posting().created_at);
        assert_eq!(resolved.effective_date, response.gateway_created_at);
        assert_eq!(resolved.first_reference_id.as_deref(), Some("9d6a"));
        assert_eq!(
            resolved.second_reference_id.as_deref(),
            Some("501a1791f8182b2071000087")
        );
        assert_eq!(resolved.reference_id(), Some("9d6a"));
    }

    #[test]
    fn test_resolve_without_posting() {
        let mut response = response(false, None, None);
        response.message = Some("Amount is too small".to_string());

        let resolved = resolve(&response, None);

        assert_eq!(resolved.status, PaymentStatus::Error);
        assert_eq!(resolved.gateway_error.as_deref(), Some("Amount is too small"));
        assert_eq!(resolved.amount, None);
        assert_eq!(resolved.currency, None);
        assert_eq!(resolved.created_date, response.created_at);
        assert_eq!(resolved.first_reference_id, None);
        assert_eq!(resolved.second_reference_id, None);
        // Effective date does not depend on the posting
        assert_eq!(resolved.effective_date, response.gateway_created_at);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let response = response(true, Some("pending"), Some("9d6a"));
        let posting = posting();
        assert_eq!(
            resolve(&response, Some(&posting)),
            resolve(&response, Some(&posting))
        );
    }
}

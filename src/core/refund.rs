//! Refund candidate selection
//!
//! Picks the charge a refund is posted against and enforces that a payment
//! is never refunded beyond what was charged for it.
//!
//! The ceiling is checked in aggregate over every charge large enough to cover
//! the refund on its own, not per charge. Some valid multi-charge splits are
//! rejected; over-refunding never gets through.
//!
//! Amounts are only compared within one currency. Currency codes match
//! case-insensitively.

use super::transaction_ledger::TransactionLedger;
use crate::types::{PaymentError, PostedTransaction};

/// Select the charge a refund of `refund_minor_units` in `currency` is posted against
///
/// # Returns
///
/// * `Ok(PostedTransaction)` - The oldest charge covering the refund
/// * `Err(PaymentError::Validation)` - If the refund is not positive, or the
///   payment was charged in another currency
/// * `Err(PaymentError::NotFound)` - If the payment has no posted charge
/// * `Err(PaymentError::InsufficientFunds)` - If no single charge is large
///   enough, or the refund exceeds what remains unrefunded
/// * `Err(PaymentError::ArithmeticOverflow)` - If a sum would overflow
pub fn select_charge_for_refund(
    ledger: &TransactionLedger,
    payment_id: &str,
    refund_minor_units: i64,
    currency: &str,
) -> Result<PostedTransaction, PaymentError> {
    if refund_minor_units <= 0 {
        return Err(PaymentError::validation(format!(
            "refund amount must be positive, got {} minor units",
            refund_minor_units
        )));
    }

    let charges = ledger.charges_for_payment(payment_id);
    if charges.is_empty() {
        return Err(PaymentError::not_found("charge", payment_id));
    }

    let charges: Vec<PostedTransaction> = charges
        .into_iter()
        .filter(|charge| same_currency(charge, currency))
        .collect();
    if charges.is_empty() {
        return Err(PaymentError::validation(format!(
            "payment {} was not charged in {}",
            payment_id, currency
        )));
    }

    let already_refunded = checked_sum(
        ledger
            .refunds_for_payment(payment_id)
            .iter()
            .filter(|refund| same_currency(refund, currency))
            .map(|refund| refund.requested_amount_minor_units),
        "refund total",
        payment_id,
    )?;

    // Charges come back in creation order
    let candidates: Vec<&PostedTransaction> = charges
        .iter()
        .filter(|charge| charge.requested_amount_minor_units >= refund_minor_units)
        .collect();

    let Some(first) = candidates.first() else {
        // No single charge covers the refund; report what is left overall
        let charged = checked_sum(
            charges.iter().map(|charge| charge.requested_amount_minor_units),
            "charge total",
            payment_id,
        )?;
        return Err(PaymentError::insufficient_funds(
            payment_id,
            remaining(charged, already_refunded, payment_id)?,
            refund_minor_units,
        ));
    };

    let charged = checked_sum(
        candidates
            .iter()
            .map(|charge| charge.requested_amount_minor_units),
        "charge total",
        payment_id,
    )?;
    let available = remaining(charged, already_refunded, payment_id)?;

    if available < refund_minor_units {
        return Err(PaymentError::insufficient_funds(
            payment_id,
            available,
            refund_minor_units,
        ));
    }

    Ok((*first).clone())
}

fn same_currency(posting: &PostedTransaction, currency: &str) -> bool {
    posting.requested_currency.eq_ignore_ascii_case(currency)
}

fn remaining(charged: i64, refunded: i64, payment_id: &str) -> Result<i64, PaymentError> {
    charged
        .checked_sub(refunded)
        .ok_or_else(|| PaymentError::arithmetic_overflow("refundable balance", payment_id))
}

fn checked_sum(
    mut amounts: impl Iterator<Item = i64>,
    operation: &str,
    payment_id: &str,
) -> Result<i64, PaymentError> {
    amounts.try_fold(0i64, |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| PaymentError::arithmetic_overflow(operation, payment_id))
    })
}

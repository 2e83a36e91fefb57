//! Provider status normalisation.
//!
//! Each provider reports payment state in its own vocabulary. These tables collapse that
//! vocabulary onto [`NormalizedStatus`]. The tables are closed: a status string that is not listed
//! maps to [`NormalizedStatus::Updated`], never to an error, so a provider shipping a new status
//! value degrades into a no-op bookkeeping update instead of breaking ingestion.

use crate::db_types::{NormalizedStatus, PaymentProvider};

pub fn normalize_status(provider: PaymentProvider, status: &str) -> NormalizedStatus {
    match provider {
        PaymentProvider::MercadoPago => normalize_mercado_pago(status),
        PaymentProvider::Stripe => normalize_stripe(status),
    }
}

fn normalize_mercado_pago(status: &str) -> NormalizedStatus {
    match status {
        "approved" => NormalizedStatus::Approved,
        "pending" | "in_process" | "in_mediation" | "authorized" => NormalizedStatus::Pending,
        "rejected" => NormalizedStatus::Rejected,
        "cancelled" => NormalizedStatus::Canceled,
        "refunded" => NormalizedStatus::Refunded,
        "charged_back" => NormalizedStatus::ChargedBack,
        "expired" => NormalizedStatus::Expired,
        _ => NormalizedStatus::Updated,
    }
}

fn normalize_stripe(status: &str) -> NormalizedStatus {
    match status {
        "succeeded" => NormalizedStatus::Approved,
        "processing" | "requires_action" | "requires_payment_method" | "requires_capture" | "requires_confirmation" => {
            NormalizedStatus::Pending
        },
        "canceled" => NormalizedStatus::Canceled,
        "payment_failed" | "failed" => NormalizedStatus::Rejected,
        "refunded" => NormalizedStatus::Refunded,
        "disputed" => NormalizedStatus::ChargedBack,
        "expired" => NormalizedStatus::Expired,
        _ => NormalizedStatus::Updated,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::NormalizedStatus::*;

    #[test]
    fn mercado_pago_table_is_exhaustive() {
        let cases = [
            ("approved", Approved),
            ("pending", Pending),
            ("in_process", Pending),
            ("in_mediation", Pending),
            ("authorized", Pending),
            ("rejected", Rejected),
            ("cancelled", Canceled),
            ("refunded", Refunded),
            ("charged_back", ChargedBack),
            ("expired", Expired),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_status(PaymentProvider::MercadoPago, raw), expected, "status {raw}");
        }
    }

    #[test]
    fn stripe_table_is_exhaustive() {
        let cases = [
            ("succeeded", Approved),
            ("processing", Pending),
            ("requires_action", Pending),
            ("requires_payment_method", Pending),
            ("requires_capture", Pending),
            ("requires_confirmation", Pending),
            ("canceled", Canceled),
            ("payment_failed", Rejected),
            ("failed", Rejected),
            ("refunded", Refunded),
            ("disputed", ChargedBack),
            ("expired", Expired),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_status(PaymentProvider::Stripe, raw), expected, "status {raw}");
        }
    }

    #[test]
    fn unknown_statuses_fall_back_to_updated() {
        assert_eq!(normalize_status(PaymentProvider::MercadoPago, "shiny_new_status"), Updated);
        assert_eq!(normalize_status(PaymentProvider::MercadoPago, ""), Updated);
        assert_eq!(normalize_status(PaymentProvider::Stripe, "requires_vibes"), Updated);
        // Vocabulary is per provider: MP's "approved" means nothing coming from Stripe.
        assert_eq!(normalize_status(PaymentProvider::Stripe, "approved"), Updated);
        assert_eq!(normalize_status(PaymentProvider::MercadoPago, "succeeded"), Updated);
    }
}

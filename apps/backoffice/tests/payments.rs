//! Payment workflow: schedule, process, confirm, cancel, approval gating.

mod common;

use backoffice::{ApiError, ErrorCode, ServiceError};
use common::*;
use facture_core::{FactureStatus, PaymentStatus, UpdatePayment};

#[tokio::test]
async fn test_partial_then_full_payment() {
    let service = service().await;
    let detail = verified(&service, None, 1_000_000).await;
    let id = &detail.facture.id;

    let first = pay(&service, id, 600_000).await;
    assert_eq!(first.payment.status, PaymentStatus::Confirmed);
    assert_eq!(first.facture.status, FactureStatus::PartiallyPaid);
    assert_eq!(first.facture.paid_amount, 600_000);
    assert_eq!(first.facture.outstanding().minor(), 400_000);

    let second = pay(&service, id, 400_000).await;
    assert_eq!(second.facture.status, FactureStatus::Paid);
    assert_eq!(second.facture.paid_amount, 1_000_000);
    assert_eq!(second.facture.outstanding().minor(), 0);

    let payments = service.list_payments(ADMIN, id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert!(payments.iter().all(|p| p.status == PaymentStatus::Confirmed));
    assert_eq!(payments[0].amount, 600_000);

    let err = service
        .schedule_payment(ADMIN, id, schedule_req(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");
}

#[tokio::test]
async fn test_duplicate_confirm_never_double_counts() {
    let service = service().await;
    let detail = verified(&service, None, 1_000_000).await;
    let payment_id = processed_payment(&service, &detail.facture.id, 300_000).await;

    let confirmed = service
        .confirm_payment(ADMIN, &payment_id, None)
        .await
        .unwrap();
    assert_eq!(confirmed.facture.paid_amount, 300_000);

    let err = service
        .confirm_payment(ADMIN, &payment_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");

    let facture = service.get_by_id(ADMIN, &detail.facture.id).await.unwrap().facture;
    assert_eq!(facture.paid_amount, 300_000);
    assert_eq!(facture.status, FactureStatus::PartiallyPaid);
}

#[tokio::test]
async fn test_overpayment_is_rejected() {
    let service = service().await;
    let detail = verified(&service, None, 1_000_000).await;
    let id = &detail.facture.id;

    service
        .schedule_payment(ADMIN, id, schedule_req(700_000))
        .await
        .unwrap();

    // 700k already pending leaves room for 300k
    let err = service
        .schedule_payment(ADMIN, id, schedule_req(400_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");

    let api = ApiError::from(err);
    assert_eq!(api.code, ErrorCode::ValidationError);

    let facture = service.get_by_id(ADMIN, id).await.unwrap().facture;
    assert_eq!(facture.paid_amount, 0);
    assert_eq!(facture.status, FactureStatus::Verified);
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let service = service().await;
    let detail = verified(&service, None, 1_000_000).await;

    let err = service
        .schedule_payment(ADMIN, &detail.facture.id, schedule_req(0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_large_invoice_needs_approval_before_payment() {
    let service = service().await;
    let detail = verified(&service, None, 60_000_000).await;
    let id = &detail.facture.id;

    let err = service
        .schedule_payment(ADMIN, id, schedule_req(10_000_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");

    let pending = service.pending_approval(ADMIN).await.unwrap();
    assert!(pending.iter().any(|f| &f.id == id));

    service.approve_invoice(ADMIN, id, None).await.unwrap();
    let paid = pay(&service, id, 60_000_000).await;
    assert_eq!(paid.facture.status, FactureStatus::Paid);
}

#[tokio::test]
async fn test_payment_on_received_invoice_is_invalid() {
    let service = service().await;
    let detail = received(&service, None, 500_000).await;

    let err = service
        .schedule_payment(ADMIN, &detail.facture.id, schedule_req(100_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");
}

#[tokio::test]
async fn test_payment_transitions_are_guarded() {
    let service = service().await;
    let detail = verified(&service, None, 1_000_000).await;
    let scheduled = service
        .schedule_payment(ADMIN, &detail.facture.id, schedule_req(200_000))
        .await
        .unwrap();
    let payment_id = &scheduled.payment.id;
    assert_eq!(scheduled.payment.status, PaymentStatus::Scheduled);

    // Scheduled cannot be confirmed
    let err = service.confirm_payment(ADMIN, payment_id, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");

    let processed = service
        .process_payment(ADMIN, payment_id, process_req("TRX-777"))
        .await
        .unwrap();
    assert_eq!(processed.payment.status, PaymentStatus::Processed);
    assert_eq!(processed.payment.reference_number.as_deref(), Some("TRX-777"));

    let err = service
        .process_payment(ADMIN, payment_id, process_req("TRX-778"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");
}

#[tokio::test]
async fn test_cancel_payment_frees_capacity() {
    let service = service().await;
    let detail = verified(&service, None, 1_000_000).await;
    let id = &detail.facture.id;

    let scheduled = service
        .schedule_payment(ADMIN, id, schedule_req(1_000_000))
        .await
        .unwrap();
    let cancelled = service
        .cancel_payment(ADMIN, &scheduled.payment.id, "wrong bank account")
        .await
        .unwrap();
    assert_eq!(cancelled.payment.status, PaymentStatus::Failed);
    assert_eq!(cancelled.payment.failure_reason.as_deref(), Some("wrong bank account"));
    assert_eq!(cancelled.facture.paid_amount, 0);

    let err = service
        .cancel_payment(ADMIN, &scheduled.payment.id, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");

    // The failed payment no longer counts against the invoice
    service
        .schedule_payment(ADMIN, id, schedule_req(1_000_000))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_payment_details() {
    let service = service().await;
    let detail = verified(&service, None, 1_000_000).await;
    let scheduled = service
        .schedule_payment(ADMIN, &detail.facture.id, schedule_req(500_000))
        .await
        .unwrap();

    let updated = service
        .update_payment(
            ADMIN,
            &scheduled.payment.id,
            UpdatePayment {
                bank_account: Some("Mandiri 9876543210".to_string()),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.payment.bank_account.as_deref(), Some("Mandiri 9876543210"));

    let err = service
        .list_payments(ADMIN, "no-such-facture")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_paid_amount_stays_within_total() {
    let service = service().await;
    let detail = verified(&service, None, 900_000).await;
    let id = &detail.facture.id;

    for amount in [100_000, 250_000, 550_000] {
        let result = pay(&service, id, amount).await;
        let f = &result.facture;
        assert!(f.paid_amount >= 0 && f.paid_amount <= f.total_amount);
        match f.status {
            FactureStatus::Paid => assert_eq!(f.paid_amount, f.total_amount),
            FactureStatus::PartiallyPaid => assert!(f.paid_amount > 0 && f.paid_amount < f.total_amount),
            other => panic!("unexpected status {other}"),
        }
    }
}

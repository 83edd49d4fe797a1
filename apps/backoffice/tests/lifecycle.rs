//! Facture lifecycle through the service: receive, verify, approve,
//! dispute/resume, cancel, update.

mod common;

use backoffice::ServiceError;
use common::*;
use facture_core::{FactureStatus, ItemVerification, ReceiveFacture, Supplier, UpdateFacture};

#[tokio::test]
async fn test_due_date_from_supplier_terms() {
    let service = service().await;

    let detail = received(&service, None, 1_000_000).await;

    assert_eq!(detail.facture.invoice_date, date(2024, 1, 1));
    assert_eq!(detail.facture.due_date, date(2024, 1, 31));
    assert_eq!(detail.facture.status, FactureStatus::Received);
    assert_eq!(detail.facture.paid_amount, 0);
    assert_eq!(detail.facture.received_by, ADMIN);
    assert!(detail.facture.internal_reference_number.starts_with("INT-FAC-"));
}

#[tokio::test]
async fn test_explicit_due_date_wins() {
    let service = service().await;
    let mut req = receive_req(None, 1_000_000);
    req.due_date = Some(date(2024, 2, 15));

    let detail = service.receive_invoice(ADMIN, req).await.unwrap();
    assert_eq!(detail.facture.due_date, date(2024, 2, 15));
}

#[tokio::test]
async fn test_total_derived_from_items() {
    let service = service().await;
    let req = ReceiveFacture {
        total_amount: None,
        items: vec![item("Rice 5kg", 10, 65_000), item("Cooking oil 2L", 4, 38_000)],
        ..receive_req(None, 0)
    };

    let detail = service.receive_invoice(ADMIN, req).await.unwrap();

    assert_eq!(detail.items.len(), 2);
    assert_eq!(detail.facture.total_amount, 650_000 + 152_000);
    assert!(detail.facture.total_from_items);
}

#[tokio::test]
async fn test_declared_total_must_match_items() {
    let service = service().await;
    let req = ReceiveFacture {
        total_amount: Some(999),
        items: vec![item("Sugar 1kg", 2, 17_500)],
        ..receive_req(None, 0)
    };

    let err = service.receive_invoice(ADMIN, req).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_oversized_amounts_rejected_before_write() {
    let service = service().await;

    let single = ReceiveFacture {
        total_amount: None,
        items: vec![item("Turbine", 3, i64::MAX / 2)],
        ..receive_req(None, 0)
    };
    let err = service.receive_invoice(ADMIN, single).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");

    let many = ReceiveFacture {
        total_amount: None,
        items: (0..3).map(|_| item("Turbine", 1, i64::MAX / 2)).collect(),
        ..receive_req(None, 0)
    };
    let err = service.receive_invoice(ADMIN, many).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");

    let mut header = receive_req(None, 1_000_000);
    header.tax_amount = i64::MAX;
    let err = service.receive_invoice(ADMIN, header).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");

    assert!(service.list(ADMIN, &Default::default()).await.unwrap().is_empty());

    let detail = received(&service, None, 1_000_000).await;
    let err = service
        .add_item(ADMIN, &detail.facture.id, item("Turbine", 3, i64::MAX / 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
    let after = service.get_by_id(ADMIN, &detail.facture.id).await.unwrap();
    assert!(after.items.is_empty());
    assert_eq!(after.facture.total_amount, 1_000_000);
}

#[tokio::test]
async fn test_payment_terms_past_calendar_end() {
    let service = service().await;
    service
        .database()
        .directory()
        .insert_supplier(&Supplier {
            id: "sup-forever".to_string(),
            company_name: "PT Tanpa Batas".to_string(),
            payment_terms_days: i64::MAX,
            credit_limit: 0,
        })
        .await
        .unwrap();

    let mut req = receive_req(None, 500_000);
    req.supplier_id = "sup-forever".to_string();
    let err = service.receive_invoice(ADMIN, req.clone()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");

    // An explicit due date does not need the terms
    req.due_date = Some(date(2024, 6, 30));
    let detail = service.receive_invoice(ADMIN, req).await.unwrap();
    assert_eq!(detail.facture.due_date, date(2024, 6, 30));
}

#[tokio::test]
async fn test_duplicate_supplier_invoice_number() {
    let service = service().await;
    let first = receive_req(None, 500_000);
    let mut second = receive_req(None, 700_000);
    second.supplier_invoice_number = first.supplier_invoice_number.clone();

    service.receive_invoice(ADMIN, first).await.unwrap();
    let err = service.receive_invoice(ADMIN, second).await.unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unknown_supplier_and_unknown_user() {
    let service = service().await;
    let mut req = receive_req(None, 500_000);
    req.supplier_id = "sup-missing".to_string();

    let err = service.receive_invoice(ADMIN, req).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");

    let err = service
        .receive_invoice("u-nobody", receive_req(None, 500_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { ref entity, .. } if entity == "user"));
}

#[tokio::test]
async fn test_verify_records_quantities() {
    let service = service().await;
    let req = ReceiveFacture {
        total_amount: None,
        items: vec![item("Flour 1kg", 20, 12_000)],
        ..receive_req(None, 0)
    };
    let detail = service.receive_invoice(ADMIN, req).await.unwrap();
    let item_id = detail.items[0].id.clone();

    let verified = service
        .verify_items(
            STAFF_A,
            &detail.facture.id,
            vec![ItemVerification {
                item_id: item_id.clone(),
                received_quantity: 20,
                accepted_quantity: 18,
            }],
        )
        .await
        .unwrap();

    assert_eq!(verified.facture.status, FactureStatus::Verified);
    assert_eq!(verified.facture.verified_by.as_deref(), Some(STAFF_A));
    assert!(verified.items[0].is_verified);
    assert_eq!(verified.items[0].accepted_quantity, Some(18));

    let variances = service.item_variances(ADMIN, &detail.facture.id).await.unwrap();
    assert_eq!(variances[0].rejected, Some(2));
    assert!(!variances[0].over_tolerance);

    let err = service
        .verify_items(ADMIN, &detail.facture.id, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");
}

#[tokio::test]
async fn test_accepted_above_received_is_rejected() {
    let service = service().await;
    let req = ReceiveFacture {
        total_amount: None,
        items: vec![item("Eggs tray", 5, 48_000)],
        ..receive_req(None, 0)
    };
    let detail = service.receive_invoice(ADMIN, req).await.unwrap();

    let err = service
        .verify_items(
            ADMIN,
            &detail.facture.id,
            vec![ItemVerification {
                item_id: detail.items[0].id.clone(),
                received_quantity: 4,
                accepted_quantity: 5,
            }],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
    let unchanged = service.get_by_id(ADMIN, &detail.facture.id).await.unwrap();
    assert_eq!(unchanged.facture.status, FactureStatus::Received);
}

#[tokio::test]
async fn test_add_item_only_while_received() {
    let service = service().await;
    let req = ReceiveFacture {
        total_amount: None,
        items: vec![item("Soap bar", 24, 4_500)],
        ..receive_req(None, 0)
    };
    let detail = service.receive_invoice(ADMIN, req).await.unwrap();

    let updated = service
        .add_item(ADMIN, &detail.facture.id, item("Shampoo", 6, 21_000))
        .await
        .unwrap();
    assert_eq!(updated.items.len(), 2);
    assert_eq!(updated.facture.total_amount, 108_000 + 126_000);

    service
        .verify_items(ADMIN, &detail.facture.id, Vec::new())
        .await
        .unwrap();
    let err = service
        .add_item(ADMIN, &detail.facture.id, item("Toothpaste", 1, 9_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");
}

#[tokio::test]
async fn test_approve_only_at_or_above_threshold() {
    let service = service().await;

    let small = verified(&service, None, 1_000_000).await;
    let err = service
        .approve_invoice(ADMIN, &small.facture.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");

    let large = verified(&service, None, 60_000_000).await;
    let approved = service
        .approve_invoice(ADMIN, &large.facture.id, Some("budget ok"))
        .await
        .unwrap();
    assert_eq!(approved.facture.status, FactureStatus::Approved);
    assert_eq!(approved.facture.approved_by.as_deref(), Some(ADMIN));
    assert!(approved
        .facture
        .notes
        .as_deref()
        .is_some_and(|n| n.contains("budget ok")));
}

#[tokio::test]
async fn test_dispute_then_resume() {
    let service = service().await;
    let detail = verified(&service, None, 2_000_000).await;
    let id = &detail.facture.id;

    let disputed = service
        .dispute_invoice(ADMIN, id, "wrong unit price", vec!["photo-001.jpg".to_string()])
        .await
        .unwrap();
    assert_eq!(disputed.facture.status, FactureStatus::Disputed);
    assert_eq!(disputed.facture.dispute_reason.as_deref(), Some("wrong unit price"));
    assert_eq!(disputed.facture.supporting_documents, vec!["photo-001.jpg".to_string()]);

    let err = service
        .schedule_payment(ADMIN, id, schedule_req(100_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");

    let err = service
        .dispute_invoice(ADMIN, id, "again", Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");

    let resumed = service
        .resume_invoice(ADMIN, id, "supplier sent credit note")
        .await
        .unwrap();
    assert_eq!(resumed.facture.status, FactureStatus::Received);
    assert!(resumed.facture.dispute_reason.is_none());
    assert!(resumed.facture.verified_by.is_none());
}

#[tokio::test]
async fn test_dispute_requires_reason() {
    let service = service().await;
    let detail = received(&service, None, 300_000).await;

    let err = service
        .dispute_invoice(ADMIN, &detail.facture.id, "   ", Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_cancel_before_payment() {
    let service = service().await;
    let detail = received(&service, None, 300_000).await;

    let cancelled = service
        .cancel_invoice(ADMIN, &detail.facture.id, "duplicate delivery")
        .await
        .unwrap();
    assert_eq!(cancelled.facture.status, FactureStatus::Cancelled);
    assert_eq!(cancelled.facture.cancelled_by.as_deref(), Some(ADMIN));

    let err = service
        .cancel_invoice(ADMIN, &detail.facture.id, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");
}

#[tokio::test]
async fn test_cancel_partially_paid_is_invalid() {
    let service = service().await;
    let detail = verified(&service, None, 1_000_000).await;
    pay(&service, &detail.facture.id, 250_000).await;

    let err = service
        .cancel_invoice(ADMIN, &detail.facture.id, "changed our mind")
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InvalidTransition(_)), "got {err:?}");
    let still = service.get_by_id(ADMIN, &detail.facture.id).await.unwrap();
    assert_eq!(still.facture.status, FactureStatus::PartiallyPaid);
    assert_eq!(still.facture.paid_amount, 250_000);
}

#[tokio::test]
async fn test_update_invoice_metadata() {
    let service = service().await;
    let detail = received(&service, None, 400_000).await;
    let id = &detail.facture.id;

    let updated = service
        .update_invoice(
            ADMIN,
            id,
            UpdateFacture {
                due_date: Some(date(2024, 2, 10)),
                purchase_order_number: Some("PO-2024-0042".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.facture.due_date, date(2024, 2, 10));
    assert_eq!(updated.facture.purchase_order_number.as_deref(), Some("PO-2024-0042"));

    let err = service
        .update_invoice(
            ADMIN,
            id,
            UpdateFacture {
                due_date: Some(date(2023, 12, 1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");

    let err = service
        .update_invoice(ADMIN, id, UpdateFacture::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
}

//! Shared fixtures for the service integration tests.

#![allow(dead_code)]

use backoffice::{FactureService, WorkflowSettings};
use chrono::NaiveDate;
use facture_core::{
    FactureDetail, ItemVerification, NewFactureItem, PaymentMethod, PaymentResult, ProcessPayment,
    ReceiveFacture, Role, SchedulePayment, Supplier,
};
use facture_db::{Database, DbConfig, RetryPolicy};
use uuid::Uuid;

pub const ADMIN: &str = "u-admin";
pub const STAFF_A: &str = "u-staff-a";
pub const STAFF_B: &str = "u-staff-b";
pub const UNASSIGNED: &str = "u-floater";

pub const BRANCH_A: &str = "BR-A";
pub const BRANCH_B: &str = "BR-B";

/// Net-30 supplier.
pub const SUPPLIER: &str = "sup-net30";
/// Supplier with no payment terms.
pub const SUPPLIER_COD: &str = "sup-cod";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Inserts the suppliers and users every test relies on.
pub async fn seed_directory(db: &Database) {
    let directory = db.directory();
    for (id, name, terms) in [(SUPPLIER, "PT Sumber Makmur", 30), (SUPPLIER_COD, "CV Tunai Jaya", 0)] {
        directory
            .insert_supplier(&Supplier {
                id: id.to_string(),
                company_name: name.to_string(),
                payment_terms_days: terms,
                credit_limit: 500_000_000,
            })
            .await
            .unwrap();
    }

    directory.insert_user(ADMIN, "Admin", Role::Admin, None).await.unwrap();
    directory
        .insert_user(STAFF_A, "Staff A", Role::Staff, Some(BRANCH_A))
        .await
        .unwrap();
    directory
        .insert_user(STAFF_B, "Staff B", Role::Staff, Some(BRANCH_B))
        .await
        .unwrap();
    directory
        .insert_user(UNASSIGNED, "Floater", Role::Manager, None)
        .await
        .unwrap();
}

pub async fn service_on(db: Database) -> FactureService {
    seed_directory(&db).await;
    FactureService::with_sqlite_directory(db, WorkflowSettings::default(), RetryPolicy::default())
}

/// Service over a fresh in-memory database.
pub async fn service() -> FactureService {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    service_on(db).await
}

pub fn receive_req(branch: Option<&str>, total: i64) -> ReceiveFacture {
    ReceiveFacture {
        supplier_id: SUPPLIER.to_string(),
        supplier_invoice_number: format!("SI-{}", Uuid::new_v4()),
        branch_id: branch.map(str::to_string),
        invoice_date: date(2024, 1, 1),
        total_amount: Some(total),
        ..Default::default()
    }
}

pub fn item(description: &str, quantity: i64, unit_price: i64) -> NewFactureItem {
    NewFactureItem {
        description: description.to_string(),
        quantity,
        unit_price,
        ..Default::default()
    }
}

pub async fn received(service: &FactureService, branch: Option<&str>, total: i64) -> FactureDetail {
    service
        .receive_invoice(ADMIN, receive_req(branch, total))
        .await
        .unwrap()
}

/// Received and verified (no items to check).
pub async fn verified(service: &FactureService, branch: Option<&str>, total: i64) -> FactureDetail {
    let detail = received(service, branch, total).await;
    service
        .verify_items(ADMIN, &detail.facture.id, Vec::<ItemVerification>::new())
        .await
        .unwrap()
}

pub fn schedule_req(amount: i64) -> SchedulePayment {
    SchedulePayment {
        amount,
        scheduled_date: date(2024, 1, 25),
        method: PaymentMethod::BankTransfer,
        bank_account: Some("BCA 0123456789".to_string()),
        notes: None,
    }
}

pub fn process_req(reference: &str) -> ProcessPayment {
    ProcessPayment {
        payment_date: Some(date(2024, 1, 25)),
        reference_number: reference.to_string(),
        receipt_file: None,
    }
}

/// Schedules and processes a payment, leaving it ready to confirm.
pub async fn processed_payment(service: &FactureService, facture_id: &str, amount: i64) -> String {
    let scheduled = service
        .schedule_payment(ADMIN, facture_id, schedule_req(amount))
        .await
        .unwrap();
    service
        .process_payment(ADMIN, &scheduled.payment.id, process_req("TRX-001"))
        .await
        .unwrap();
    scheduled.payment.id
}

/// Full schedule → process → confirm cycle.
pub async fn pay(service: &FactureService, facture_id: &str, amount: i64) -> PaymentResult {
    let payment_id = processed_payment(service, facture_id, amount).await;
    service
        .confirm_payment(ADMIN, &payment_id, Some("received in full"))
        .await
        .unwrap()
}

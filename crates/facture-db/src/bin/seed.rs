//! # Seed Data Generator
//!
//! Populates the database with suppliers, users and factures for development.
//!
//! ## Usage
//! ```bash
//! # Generate 40 factures (default)
//! cargo run -p facture-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p facture-db --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p facture-db --bin seed -- --db ./data/backoffice.db
//! ```
//!
//! ## Generated Data
//! - 6 suppliers with 14-60 day payment terms
//! - An admin, and a manager plus staff for each of two branches
//! - Factures spread over branches and the lifecycle:
//!   received, verified, approved, partially paid, paid, disputed

use chrono::{Datelike, Duration, NaiveDate, Utc};
use facture_core::calc::{resolve_due_date, total_from_new_items};
use facture_core::{
    AccessScope, ItemVerification, Money, NewFactureItem, PaymentMethod, ProcessPayment,
    ReceiveFacture, Role, SchedulePayment, Supplier, APPROVAL_THRESHOLD,
};
use facture_db::{Database, DbConfig, NewFacture};
use std::env;

/// Suppliers: (id, name, payment terms)
const SUPPLIERS: &[(&str, &str, i64)] = &[
    ("sup-001", "PT Sumber Makmur", 30),
    ("sup-002", "CV Berkah Jaya", 14),
    ("sup-003", "PT Indo Pangan Lestari", 45),
    ("sup-004", "UD Sinar Terang", 30),
    ("sup-005", "PT Nusantara Distribusi", 60),
    ("sup-006", "CV Mitra Sejati", 21),
];

/// Users: (id, name, role, branch)
const USERS: &[(&str, &str, Role, Option<&str>)] = &[
    ("u-admin", "Admin", Role::Admin, None),
    ("u-mgr-jkt", "Manager Jakarta", Role::Manager, Some("BR-JKT")),
    ("u-staff-jkt", "Staff Jakarta", Role::Staff, Some("BR-JKT")),
    ("u-mgr-sby", "Manager Surabaya", Role::Manager, Some("BR-SBY")),
    ("u-staff-sby", "Staff Surabaya", Role::Staff, Some("BR-SBY")),
];

const BRANCHES: &[Option<&str>] = &[Some("BR-JKT"), Some("BR-SBY"), None];

/// Products: (name, unit price in minor units)
const PRODUCTS: &[(&str, i64)] = &[
    ("Beras Premium 5kg", 72_500),
    ("Minyak Goreng 2L", 34_000),
    ("Gula Pasir 1kg", 16_500),
    ("Tepung Terigu 1kg", 12_000),
    ("Kopi Bubuk 200g", 27_000),
    ("Teh Celup 25s", 8_500),
    ("Susu UHT 1L", 19_000),
    ("Mie Instan (dus)", 112_000),
];

/// Tax rates in basis points
const TAX_RATES: &[u32] = &[0, 1100];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 40;
    let mut db_path = String::from("./backoffice_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Facture Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of factures to generate (default: 40)");
                println!("  -d, --db <PATH>    Database file path (default: ./backoffice_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Facture Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Factures: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.directory().count_suppliers().await?;
    if existing > 0 {
        println!("⚠ Database already has {} suppliers", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (id, name, terms) in SUPPLIERS {
        db.directory()
            .insert_supplier(&Supplier {
                id: id.to_string(),
                company_name: name.to_string(),
                payment_terms_days: *terms,
                credit_limit: 500_000_000,
            })
            .await?;
    }
    for (id, name, role, branch) in USERS {
        db.directory().insert_user(id, name, *role, *branch).await?;
    }
    println!("✓ {} suppliers, {} users", SUPPLIERS.len(), USERS.len());

    println!();
    println!("Generating factures...");

    let start = std::time::Instant::now();
    let today = Utc::now().date_naive();
    let mut generated = 0;

    for seed in 0..count {
        if let Err(e) = seed_facture(&db, seed, today).await {
            eprintln!("Failed to seed facture {}: {}", seed, e);
            continue;
        }
        generated += 1;

        if generated % 20 == 0 {
            println!("  Generated {} factures...", generated);
        }
    }

    println!();
    println!("✓ Generated {} factures in {:?}", generated, start.elapsed());

    let summary = db.factures().summary(&AccessScope::Unrestricted, today).await?;
    for row in &summary.by_status {
        println!(
            "  {:<15} {:>4}  {:>18}",
            row.status.as_str(),
            row.count,
            Money::from_minor(row.total_amount).to_string()
        );
    }
    println!(
        "  Outstanding: {}  Overdue: {}",
        Money::from_minor(summary.total_outstanding),
        summary.overdue_count
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Receives one facture and walks it partway through the lifecycle.
async fn seed_facture(
    db: &Database,
    seed: usize,
    today: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let (supplier_id, _, terms) = SUPPLIERS[seed % SUPPLIERS.len()];
    let branch = BRANCHES[seed % BRANCHES.len()];
    let invoice_date = today - Duration::days(((seed * 7) % 90) as i64);

    let items: Vec<NewFactureItem> = (0..1 + seed % 4)
        .map(|n| {
            let (name, price) = PRODUCTS[(seed + n) % PRODUCTS.len()];
            NewFactureItem {
                product_id: None,
                description: name.to_string(),
                quantity: 10 + ((seed * 13 + n * 5) % 90) as i64,
                unit_price: price,
                tax_rate_bps: TAX_RATES[(seed + n) % TAX_RATES.len()],
                discount_amount: 0,
            }
        })
        .collect();
    let total = total_from_new_items(&items, Money::zero(), Money::zero())?;

    let request = ReceiveFacture {
        supplier_id: supplier_id.to_string(),
        supplier_invoice_number: format!("{}/{}/{:04}", supplier_id.to_uppercase(), invoice_date.year(), seed),
        branch_id: branch.map(str::to_string),
        invoice_date,
        items,
        ..Default::default()
    };
    let due_date = resolve_due_date(invoice_date, None, terms)?;

    let detail = db
        .factures()
        .receive(&NewFacture {
            request,
            due_date,
            total_amount: total.minor(),
            total_from_items: true,
            received_by: "u-admin".to_string(),
            reference_year: invoice_date.year(),
        })
        .await?;

    let scope = AccessScope::Unrestricted;
    let id = detail.facture.id.clone();
    let stage = seed % 6;

    if stage == 0 {
        return Ok(());
    }

    let verifications: Vec<ItemVerification> = detail
        .items
        .iter()
        .map(|item| ItemVerification {
            item_id: item.id.clone(),
            received_quantity: item.quantity,
            accepted_quantity: item.quantity - (seed % 2) as i64,
        })
        .collect();
    db.factures().verify(&id, &scope, &verifications, "u-admin").await?;

    if stage == 5 {
        db.factures()
            .dispute(&id, &scope, "u-admin", "Damaged goods on delivery", &[])
            .await?;
        return Ok(());
    }
    if stage == 1 {
        return Ok(());
    }

    if total.minor() >= APPROVAL_THRESHOLD {
        db.factures()
            .approve(&id, &scope, "u-admin", "Approved for payment", APPROVAL_THRESHOLD)
            .await?;
    }
    if stage == 2 {
        return Ok(());
    }

    let amount = if stage == 3 { total.minor() / 2 } else { total.minor() };
    let scheduled = db
        .payments()
        .schedule(
            &id,
            &scope,
            &SchedulePayment {
                amount,
                scheduled_date: today,
                method: PaymentMethod::BankTransfer,
                bank_account: Some("BCA 0123456789".to_string()),
                notes: None,
            },
            "u-admin",
            APPROVAL_THRESHOLD,
        )
        .await?;
    db.payments()
        .process(
            &scheduled.payment.id,
            &scope,
            &ProcessPayment {
                payment_date: Some(today),
                reference_number: format!("TRX-{:06}", seed),
                receipt_file: None,
            },
            "u-admin",
            today,
        )
        .await?;
    db.payments()
        .confirm(&scheduled.payment.id, &scope, None, "u-admin", APPROVAL_THRESHOLD)
        .await?;

    Ok(())
}

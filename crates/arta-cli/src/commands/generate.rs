//! Sample data seeding
//!
//! Inserts a labeled expense corpus (plus monthly salary income) spread
//! over the requested number of months, enough to train all three models.

use std::path::Path;

use anyhow::Result;
use chrono::{Datelike, Duration, Utc};

use arta_core::{NewTransaction, TransactionType};

use super::open_db;

/// Labeled sample expenses covering every category
const SAMPLE_EXPENSES: &[(&str, &str, f64)] = &[
    ("Makan siang di warung padang", "Makanan", 25_000.0),
    ("Sarapan roti dan kopi", "Makanan", 15_000.0),
    ("Makan malam di restoran", "Makanan", 80_000.0),
    ("Beli nasi goreng", "Makanan", 20_000.0),
    ("Minum jus buah", "Makanan", 12_000.0),
    ("Makan bakso", "Makanan", 18_000.0),
    ("Beli martabak", "Makanan", 30_000.0),
    ("Kedai kopi Starbucks", "Makanan", 45_000.0),
    ("Isi bensin motor", "Transportasi", 20_000.0),
    ("Bayar parkir", "Transportasi", 5_000.0),
    ("Gojek ke kantor", "Transportasi", 15_000.0),
    ("Tiket busway", "Transportasi", 3_500.0),
    ("Service motor", "Transportasi", 150_000.0),
    ("Beli oli motor", "Transportasi", 75_000.0),
    ("Taxi online", "Transportasi", 35_000.0),
    ("Belanja di supermarket", "Belanja", 300_000.0),
    ("Beli baju di mall", "Belanja", 250_000.0),
    ("Order dari tokopedia", "Belanja", 120_000.0),
    ("Beli elektronik", "Belanja", 500_000.0),
    ("Belanja bulanan", "Belanja", 450_000.0),
    ("Peralatan rumah tangga", "Belanja", 200_000.0),
    ("Nonton film di bioskop", "Hiburan", 50_000.0),
    ("Main game online", "Hiburan", 100_000.0),
    ("Karaoke dengan teman", "Hiburan", 75_000.0),
    ("Tiket konser musik", "Hiburan", 300_000.0),
    ("Langganan Netflix", "Hiburan", 54_000.0),
    ("Konsultasi dokter", "Kesehatan", 150_000.0),
    ("Beli obat di apotik", "Kesehatan", 75_000.0),
    ("Medical checkup", "Kesehatan", 500_000.0),
    ("Vitamin dan suplemen", "Kesehatan", 120_000.0),
    ("Bayar listrik", "Lainnya", 350_000.0),
    ("Biaya administrasi bank", "Lainnya", 15_000.0),
    ("Bayar tagihan air", "Lainnya", 80_000.0),
];

pub fn cmd_generate(db_path: &Path, months: u32) -> Result<()> {
    println!("🌱 Seeding {} months of sample transactions...", months);

    let db = open_db(db_path)?;
    let today = Utc::now().date_naive();
    let mut inserted = 0usize;

    for month_offset in 0..months {
        let month_anchor = today - Duration::days(30 * month_offset as i64);
        for (i, (description, category, amount)) in SAMPLE_EXPENSES.iter().enumerate() {
            let date = month_anchor - Duration::days((i % 28) as i64);
            db.insert_transaction(&NewTransaction {
                date,
                amount: *amount,
                description: description.to_string(),
                transaction_type: TransactionType::Expense,
                category: Some(category.to_string()),
            })?;
            inserted += 1;
        }

        // One salary per month so insights have an income side
        let payday = month_anchor.with_day(1).unwrap_or(month_anchor);
        db.insert_transaction(&NewTransaction {
            date: payday,
            amount: 8_000_000.0,
            description: "Gaji bulanan".to_string(),
            transaction_type: TransactionType::Income,
            category: None,
        })?;
        inserted += 1;
    }

    println!("✅ Generated {} sample transactions", inserted);
    println!("📊 Categories: Makanan, Transportasi, Belanja, Hiburan, Kesehatan, Lainnya");

    Ok(())
}

use rent_ledger_core::prelude::*;
use rent_ledger_core::{BillCalculator, JsonFileStore, MemoryStore, MonthLoad};
use std::env;
use std::sync::Arc;

fn format_number(n: f64) -> String {
    let s = (n.round() as i64).to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 && c != '-' {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let month = match args.get(1) {
        Some(key) => MonthKey::parse(key)?,
        None => MonthKey::current(),
    };

    // Optional second argument: a JSON file to use instead of memory.
    let store: Arc<dyn BillStore> = match args.get(2) {
        Some(path) => {
            println!("Using bills from: {}", path);
            Arc::new(JsonFileStore::new(path))
        }
        None => Arc::new(MemoryStore::new()),
    };

    let seeder = rent_ledger_core::BillSeeder::new();
    let load = rent_ledger_core::load_month(store.as_ref(), &seeder, month).await?;
    match &load {
        MonthLoad::Existing(_) => println!("{} already had bills", month),
        MonthLoad::Seeded { source, .. } => println!("Seeded {} ({:?})", month, source),
        MonthLoad::AlreadySeeded(_) => println!("{} was seeded by someone else", month),
    }

    let calculator = BillCalculator::new();
    println!();
    println!("{:<8} {:>6} {:>14} {:>14}", "Room", "People", "Total", "Per person");
    for bill in load.bills() {
        let calculation = calculator.calculate(bill);
        println!(
            "{:<8} {:>6} {:>14} {:>14}",
            bill.room_name(),
            bill.occupants,
            format_number(calculation.total_bill()),
            format_number(calculation.per_person()),
        );
    }

    let summary = calculator.summarize_month(load.bills());
    println!();
    println!("Revenue:     {} VND", format_number(summary.total_revenue));
    println!("Outstanding: {} VND", format_number(summary.outstanding));

    Ok(())
}

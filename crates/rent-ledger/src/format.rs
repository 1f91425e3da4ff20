/// Formats an amount the way Vietnamese invoices show it: `2.410.000 ₫`.
pub fn format_vnd(amount: f64) -> String {
    format!("{} ₫", group_thousands(amount.round() as i64))
}

/// Compact form for chart labels: `2,4tr`, `850k`.
pub fn format_vnd_short(amount: f64) -> String {
    let amount = amount.round();
    if amount.abs() >= 1_000_000.0 {
        let millions = format!("{:.1}", amount / 1_000_000.0);
        format!("{}tr", millions.trim_end_matches(".0").replace('.', ","))
    } else if amount.abs() >= 1_000.0 {
        format!("{}k", (amount / 1_000.0).round() as i64)
    } else {
        format!("{}", amount as i64)
    }
}

pub fn format_kwh(usage: f64) -> String {
    if usage.fract() == 0.0 {
        format!("{} kWh", usage as i64)
    } else {
        format!("{:.1} kWh", usage)
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut result = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push('.');
        }
        result.push(c);
    }
    if n < 0 {
        result.push('-');
    }
    result.chars().rev().collect()
}

fn group_thousands(digits: &str) -> String {
    let mut with_commas = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    with_commas.chars().rev().collect()
}

/// Format an amount in won with thousands separators: -4,500원
pub fn won(val: f64) -> String {
    let rounded = val.round();
    let digits = format!("{:.0}", rounded.abs());
    if rounded < 0.0 {
        format!("-{}원", group_thousands(&digits))
    } else {
        format!("{}원", group_thousands(&digits))
    }
}

pub fn percent(val: f64) -> String {
    format!("{val:.1}%")
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use dashboard_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by half an ULP at the target precision so exact midpoints round
    // away from zero.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        // "0.50" -> ".50"
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a distinct-account count with thousands separators.
///
/// ```
/// use dashboard_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(12_345), "12,345");
/// ```
pub fn format_count(count: u64) -> String {
    group_thousands(&count.to_string())
}

/// Format an optional smoothed value; the missing marker renders as `"-"`.
///
/// ```
/// use dashboard_core::formatting::format_smoothed;
///
/// assert_eq!(format_smoothed(Some(2.0 / 3.0)), "0.7");
/// assert_eq!(format_smoothed(None), "-");
/// ```
pub fn format_smoothed(value: Option<f64>) -> String {
    match value {
        Some(v) => format_number(v, 1),
        None => "-".to_string(),
    }
}

/// Format a coordinate pair with five decimals, or `"-"` when absent.
pub fn format_coordinates(coords: Option<(f64, f64)>) -> String {
    match coords {
        Some((lat, lon)) => format!("{:.5}, {:.5}", lat, lon),
        None => "-".to_string(),
    }
}

/// Insert comma thousands-separators into a string of ASCII digits.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    if len <= 3 {
        return digits.to_string();
    }
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Render a currency amount in the largest fitting scale: `bn`, `M`, `K` or plain.
pub fn format_currency_label(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value >= 1e9 {
        format!("{:.2} bn", value / 1e9)
    } else if value >= 1e6 {
        format!("{:.2} M", value / 1e6)
    } else if value >= 1e3 {
        format!("{:.2} K", value / 1e3)
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_exactly_one_scale() {
        assert_eq!(format_currency_label(1_500_000_000.0), "1.50 bn");
        assert_eq!(format_currency_label(2_300_000.0), "2.30 M");
        assert_eq!(format_currency_label(999.0), "999.00");
        assert_eq!(format_currency_label(1_000.0), "1.00 K");
        assert_eq!(format_currency_label(999_999.0), "1000.00 K");
        assert_eq!(format_currency_label(0.0), "0.00");
    }

    #[test]
    fn negative_amounts_stay_unscaled() {
        assert_eq!(format_currency_label(-5_000_000.0), "-5000000.00");
    }
}

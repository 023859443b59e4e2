use rust_decimal::Decimal;
use std::str::FromStr;

pub const CURRENCY_PREFIX: &str = "R$";

/// Parses a decimal written with Brazilian (`1.234,56`) or international
/// (`1,234.56`) separators.
///
/// When both separators occur the rightmost one is the decimal point. A lone
/// comma is the decimal point. Otherwise commas are thousands grouping.
/// Returns `None` when the text is not a number; callers must not read that
/// as zero.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    let text = text.strip_prefix(CURRENCY_PREFIX).unwrap_or(text).trim();
    if text.is_empty() {
        return None;
    }

    let normalized = match (text.rfind(','), text.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (Some(_), None) => text.replace(',', "."),
        _ => text.replace(',', ""),
    };

    Decimal::from_str(&normalized).ok()
}

/// Like [`parse_decimal`], but tolerates a trailing `%`.
pub fn parse_percentage(text: &str) -> Option<Decimal> {
    parse_decimal(text.trim().trim_end_matches('%'))
}

/// Renders `R$ 1.234,50`: two fraction digits, `.` grouping, `,` decimal.
pub fn format_currency(value: Decimal) -> String {
    let fixed = fixed_two(value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value.round_dp(2).is_zero() || value.is_sign_positive() {
        ""
    } else {
        "-"
    };
    format!(
        "{CURRENCY_PREFIX} {sign}{},{frac_part}",
        group_thousands(int_part, '.')
    )
}

/// `None` in, `None` out: an unavailable amount has no currency text.
pub fn format_currency_opt(value: Option<Decimal>) -> Option<String> {
    value.map(format_currency)
}

/// Canonical two-decimal, dot-decimal text (`4.08`) used for stored rules.
pub fn fixed_two(value: Decimal) -> String {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

/// Two-decimal text with a comma decimal point (`4,08`), no grouping.
pub fn format_decimal_br(value: Decimal) -> String {
    fixed_two(value).replace('.', ",")
}

fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

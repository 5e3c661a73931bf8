//! SPICE numeric values with scale suffixes.

/// Parse a SPICE number such as `10k`, `4.7u`, `1MEG`, `2.52n` or `1e-9`.
///
/// Scale factors are case-insensitive (`M` is milli, `MEG` is mega, `MIL` is
/// 25.4e-6). Letters after the scale factor are units and are ignored, so
/// `10pF` and `1kOhm` parse. Returns `None` for anything that does not start
/// with a number, including brace expressions.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    let number_len = numeric_prefix_len(text);
    if number_len == 0 {
        return None;
    }

    let mantissa: f64 = text[..number_len].parse().ok()?;
    let suffix = text[number_len..].to_ascii_lowercase();

    if suffix.is_empty() {
        return Some(mantissa);
    }
    if !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let scale = if suffix.starts_with("meg") {
        1e6
    } else if suffix.starts_with("mil") {
        25.4e-6
    } else {
        match suffix.as_bytes()[0] {
            b't' => 1e12,
            b'g' => 1e9,
            b'k' => 1e3,
            b'm' => 1e-3,
            b'u' => 1e-6,
            b'n' => 1e-9,
            b'p' => 1e-12,
            b'f' => 1e-15,
            _ => 1.0,
        }
    };

    Some(mantissa * scale)
}

/// Length of the leading `[+-]digits[.digits][e[+-]digits]` part of `text`.
fn numeric_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0;
    }

    // Exponent, only if it is complete; otherwise `e` is left as a unit letter.
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    i
}

//! camelCase to snake_case decoding of JSON field names.
//!
//! Each character is decided by a window of three: the previous character,
//! the character itself and the next one. An uppercase character starts a
//! new word unless it sits inside a run of capitals, so `HTMLParser`
//! becomes `html_parser` rather than `h_t_m_l_parser`.

/// Decode a camelCase identifier into lowercase words separated by `_`.
///
/// ```
/// use recordloom::transform::decode_camel_case;
///
/// assert_eq!(decode_camel_case("purchaseOrders"), "purchase_orders");
/// assert_eq!(decode_camel_case("HTMLParser"), "html_parser");
/// ```
pub fn decode_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut chars = s.chars().peekable();
    let mut prev: Option<char> = None;

    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match decode_char(prev, c, next) {
            Emit::Copy => out.push(c),
            Emit::Lower => out.extend(c.to_lowercase()),
            Emit::BreakLower => {
                out.push('_');
                out.extend(c.to_lowercase());
            }
        }
        prev = Some(c);
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Copy,
    Lower,
    BreakLower,
}

fn decode_char(prev: Option<char>, c: char, next: Option<char>) -> Emit {
    let Some(prev) = prev else {
        return Emit::Lower;
    };
    if !c.is_uppercase() {
        return Emit::Copy;
    }
    let prev_upper = prev.is_uppercase();
    match next {
        // Last character: only a break after a lowercase run.
        None if prev_upper => Emit::Lower,
        None => Emit::BreakLower,
        // Inside a run of capitals.
        Some(next) if prev_upper && next.is_uppercase() => Emit::Lower,
        Some(_) => Emit::BreakLower,
    }
}

//! 探索上限の文字列表現。
//!
//! "10G"、"1_500M"、"2GM"（= 2·10^15）のように、10 進数（`_` 区切り可）の後に
//! 接尾辞 M/G/T/P/E を並べる。接尾辞はそれぞれ 10^6/10^9/10^12/10^15/10^18 倍で、
//! 複数あれば順に掛け合わせる。

use crate::error::LimitError;

fn suffix_scale(suffix: char) -> Option<u64> {
    match suffix {
        'M' => Some(1_000_000),
        'G' => Some(1_000_000_000),
        'T' => Some(1_000_000_000_000),
        'P' => Some(1_000_000_000_000_000),
        'E' => Some(1_000_000_000_000_000_000),
        _ => None,
    }
}

/// 上限文字列を数値に変換する
pub fn decode_limit(text: &str) -> Result<u64, LimitError> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '_'))
        .unwrap_or(text.len());
    let (number, suffixes) = text.split_at(split);

    let mut limit = 0u64;
    let mut seen_digit = false;
    for c in number.chars() {
        if let Some(d) = c.to_digit(10) {
            seen_digit = true;
            limit = limit
                .checked_mul(10)
                .and_then(|l| l.checked_add(d as u64))
                .ok_or_else(|| LimitError::Overflow(text.to_string()))?;
        }
    }
    if !seen_digit {
        return Err(LimitError::NoDigits(text.to_string()));
    }

    for suffix in suffixes.chars() {
        let scale = suffix_scale(suffix).ok_or_else(|| LimitError::BadSuffix {
            input: text.to_string(),
            suffix,
        })?;
        limit = limit
            .checked_mul(scale)
            .ok_or_else(|| LimitError::Overflow(text.to_string()))?;
    }
    Ok(limit)
}

/// ログ用の短い表記（"10.0G" など）
pub fn format_limit(limit: u64) -> String {
    let l = limit as f64;
    if limit >= 1_000_000_000_000_000 {
        format!("{:.1}P", l / 1e15)
    } else if limit >= 1_000_000_000_000 {
        format!("{:.1}T", l / 1e12)
    } else if limit >= 1_000_000_000 {
        format!("{:.1}G", l / 1e9)
    } else if limit >= 1_000_000 {
        format!("{:.1}M", l / 1e6)
    } else {
        limit.to_string()
    }
}

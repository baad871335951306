//! Duration flag parsing (`--timeout`, `--rate-limit`)

use anyhow::{anyhow, Result};
use std::time::Duration;

/// Parse a duration string.
///
/// Supported formats:
/// - `ms` - milliseconds (e.g., "250ms")
/// - `s` - seconds (e.g., "30s")
/// - `m` - minutes (e.g., "5m")
/// - `h` - hours (e.g., "2h")
/// - Combined formats (e.g., "1m30s")
/// - A bare number of seconds (e.g., "60"), as accepted by `VAULT_CLIENT_TIMEOUT`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("Duration cannot be empty"));
    }

    if input.chars().all(|c| c.is_ascii_digit()) {
        let seconds: u64 = input.parse()?;
        return Ok(Duration::from_secs(seconds));
    }

    let mut total = Duration::ZERO;
    let mut current_num = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            current_num.push(ch);
        } else if ch.is_ascii_alphabetic() {
            if current_num.is_empty() {
                return Err(anyhow!("Invalid duration format: '{}'", input));
            }

            let num: u64 = current_num.parse()?;
            current_num.clear();

            let part = match ch {
                'm' if chars.peek() == Some(&'s') => {
                    chars.next();
                    Some(Duration::from_millis(num))
                }
                's' => Some(Duration::from_secs(num)),
                'm' => num.checked_mul(60).map(Duration::from_secs),
                'h' => num.checked_mul(3600).map(Duration::from_secs),
                _ => return Err(anyhow!("Unknown unit '{}'. Use: ms, s, m, h", ch)),
            };

            total = part
                .and_then(|part| total.checked_add(part))
                .ok_or_else(|| anyhow!("Duration is too large: '{}'", input))?;
        } else if !ch.is_whitespace() {
            return Err(anyhow!("Invalid character: '{}'", ch));
        }
    }

    if !current_num.is_empty() {
        return Err(anyhow!("Duration must end with a unit (ms, s, m, h)"));
    }

    Ok(total)
}

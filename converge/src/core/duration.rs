//! Duration strings in the `18h`, `1h30m`, `90s`, `500ms` format.

use std::time::Duration;

use anyhow::{Result, anyhow};

/// Lifetime of the admin credential when `--admin` is given without a value.
pub const DEFAULT_ADMIN_TTL: Duration = Duration::from_secs(18 * 60 * 60);

/// Parse a sequence of `<integer><unit>` components.
///
/// Units: `h`, `m`, `s`, `ms`. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("invalid duration {input:?}: empty"));
    }
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(anyhow!("invalid duration {input:?}: expected number"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|err| anyhow!("invalid duration {input:?}: {err}"))?;
        rest = &rest[digits..];

        let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let component = match unit {
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "s" => Duration::from_secs(value),
            "ms" => Duration::from_millis(value),
            "" => return Err(anyhow!("invalid duration {input:?}: missing unit")),
            other => return Err(anyhow!("invalid duration {input:?}: unknown unit {other:?}")),
        };
        total = total.saturating_add(component);
    }
    Ok(total)
}

/// Render a duration as whole seconds (`3600s`), the form passed to helpers.
pub fn format_seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

//! Output file naming and timing helpers shared by the vendor commands.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::time::Duration;
use uuid::Uuid;

/// Number of prompt characters kept in a generated file name.
const PROMPT_STEM_CHARS: usize = 20;

/// Which prompt characters survive into a file name; everything else becomes `_`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemCharset {
    /// ASCII letters and digits only.
    Ascii,
    /// Any Unicode letter or digit (e.g. `é` is kept).
    Unicode,
}

/// Builds a unique, filesystem-safe `.mp4` file name for a generation.
///
/// Layout: `{prefix}_{YYYYmmdd_HHMMSS}_{prompt stem}_{prompt hash}_{suffix}.mp4`.
/// The hash is the first 8 hex digits of the prompt's UUIDv5 (DNS namespace),
/// so the same prompt always hashes the same way.
pub fn unique_filename<Tz>(
    prefix: &str,
    prompt: &str,
    suffix: &str,
    charset: StemCharset,
    at: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let timestamp = at.format("%Y%m%d_%H%M%S");
    format!(
        "{prefix}_{timestamp}_{}_{}_{suffix}.mp4",
        prompt_stem(prompt, charset),
        prompt_hash(prompt)
    )
}

/// Sanitizes a model name for use in paths.
pub fn sanitize_model(model: &str) -> String {
    model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn prompt_stem(prompt: &str, charset: StemCharset) -> String {
    prompt
        .chars()
        .take(PROMPT_STEM_CHARS)
        .map(|c| {
            let keep = match charset {
                StemCharset::Ascii => c.is_ascii_alphanumeric(),
                StemCharset::Unicode => c.is_alphanumeric(),
            };
            if keep {
                c.to_lowercase().collect::<String>()
            } else {
                "_".to_string()
            }
        })
        .collect()
}

fn prompt_hash(prompt: &str) -> String {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, prompt.as_bytes());
    id.simple().to_string()[..8].to_string()
}

/// Formats an elapsed duration for humans.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.2} seconds")
    } else if secs < 3600.0 {
        format!("{:.2} minutes ({secs:.2} seconds)", secs / 60.0)
    } else {
        format!(
            "{:.2} hours ({:.2} minutes)",
            secs / 3600.0,
            (secs % 3600.0) / 60.0
        )
    }
}

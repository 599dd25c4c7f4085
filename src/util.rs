//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Round a 0..=1 ratio into a whole percentage, clamped to 0..=100.
/// Zero denominator yields zero rather than NaN.
pub fn percentage(score: u32, max: u32) -> u8 {
  if max == 0 {
    return 0;
  }
  let pct = (score as f64 / max as f64 * 100.0).round();
  pct.clamp(0.0, 100.0) as u8
}

/// Incremental running average, preserving the exact update formula used by
/// the original statistics code: new_avg = (old_avg * (n - 1) + value) / n.
/// `n` is the count INCLUDING the new sample; n == 0 returns the old average.
pub fn running_average(old_avg: f64, n: u64, value: f64) -> f64 {
  if n == 0 {
    return old_avg;
  }
  (old_avg * (n - 1) as f64 + value) / n as f64
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
#[allow(dead_code)]
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max { s.to_string() } else { format!("{}… ({} bytes total)", &s[..max], s.len()) }
}

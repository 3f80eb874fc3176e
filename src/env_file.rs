//! `.env` loading for the command-line tool.

use std::path::Path;

/// Export every assignment in `path` that is not already set in the process environment.
pub fn load(path: &Path) -> Result<usize, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let mut applied = 0;

    for (index, line) in contents.lines().enumerate() {
        let parsed = parse_assignment(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        if let Some((key, value)) = parsed
            && std::env::var_os(key).is_none()
        {
            // Runs single-threaded before anything else reads the environment.
            unsafe {
                std::env::set_var(key, value);
            }
            applied += 1;
        }
    }

    Ok(applied)
}

/// `KEY=value` with optional matching quotes; blank lines and `#` comments are skipped.
pub fn parse_assignment(line: &str) -> Result<Option<(&str, &str)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (key, value) = trimmed
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(format!("invalid variable name: '{}'", key));
    }

    let value = value.trim();
    let value = match value.chars().next() {
        Some(quote @ ('"' | '\'')) => value[1..]
            .strip_suffix(quote)
            .ok_or_else(|| format!("unterminated {} quote", quote))?,
        _ => value.split('#').next().unwrap_or_default().trim_end(),
    };

    Ok(Some((key, value)))
}

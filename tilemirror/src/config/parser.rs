//! INI parsing: maps section keys onto [`ConfigFile`] fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::{ConfigFile, ConfigFileError};

/// Overlays the values found in `ini` onto `ConfigFile::default()`.
///
/// Unknown sections and keys are ignored.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [output]
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = section.get("root") {
            let v = strip_comment(v);
            if !v.is_empty() {
                config.output.root = expand_tilde(v);
            }
        }
    }

    // [download]
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("active_window") {
            config.download.active_window = parse_number("download", "active_window", v)?;
            if config.download.active_window == 0 {
                return Err(invalid("download", "active_window", v, "must be at least 1"));
            }
        }
        if let Some(v) = section.get("idle_window") {
            config.download.idle_window = parse_number("download", "idle_window", v)?;
        }
        if let Some(v) = section.get("workers") {
            config.download.workers = parse_number("download", "workers", v)?;
            if config.download.workers == 0 {
                return Err(invalid("download", "workers", v, "must be at least 1"));
            }
        }
        if let Some(v) = section.get("timeout") {
            config.download.timeout = parse_number("download", "timeout", v)?;
            if config.download.timeout == 0 {
                return Err(invalid("download", "timeout", v, "must be at least 1"));
            }
        }
    }

    // [georef]
    if let Some(section) = ini.section(Some("georef")) {
        if let Some(v) = section.get("transform_program") {
            let v = strip_comment(v);
            if !v.is_empty() {
                config.georef.transform_program = v.to_string();
            }
        }
        if let Some(v) = section.get("translate_program") {
            let v = strip_comment(v);
            if !v.is_empty() {
                config.georef.translate_program = v.to_string();
            }
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    strip_comment(value)
        .parse()
        .map_err(|_| invalid(section, key, value, "expected a non-negative integer"))
}

/// Drops a trailing `; comment` or `# comment` and surrounding whitespace.
fn strip_comment(value: &str) -> &str {
    let end = value
        .char_indices()
        .find(|&(i, c)| {
            (c == ';' || c == '#')
                && value[..i].chars().last().map_or(true, char::is_whitespace)
        })
        .map_or(value.len(), |(i, _)| i);
    value[..end].trim()
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expands a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

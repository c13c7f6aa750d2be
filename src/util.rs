use std::{env::VarError, fmt::Display, str::FromStr};

use anyhow::{Result, anyhow, bail};


pub fn getenv_or(name: &str, fallbackvalue: Option<&str>) -> Result<String> {
    match std::env::var(name) {
        Ok(s) => Ok(s),
        Err(e) => match e {
            VarError::NotPresent =>
                match fallbackvalue {
                    Some(v) => Ok(v.to_string()),
                    None => bail!("{name:?} env var is missing and \
                                   no default provided"),
                },
            VarError::NotUnicode(_) => bail!("{name:?} env var is not unicode"),
        }
    }
}

pub fn getenv(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(s) => Ok(Some(s)),
        Err(e) => match e {
            VarError::NotPresent => Ok(None),
            VarError::NotUnicode(_) => bail!("{name:?} env var is not unicode"),
        }
    }
}

/// Like getenv but reports an error mentioning the variable name if
/// it isn't set.
pub fn xgetenv(name: &str) -> Result<String> {
    getenv(name)?.ok_or_else(
        || anyhow!("missing env var {name:?}"))
}

/// The parsed value of env var `name`, `default` if it isn't set.
pub fn getenv_parsed<T>(name: &str, default: T) -> Result<T>
where T: FromStr, T::Err: Display
{
    match getenv(name)? {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(
            |e| anyhow!("invalid value for env var {name:?}: {e}: {s:?}")),
    }
}

/// `1`, `true`, `yes`, `on` (case insensitive) are true, `0`,
/// `false`, `no`, `off` and the empty string false.
pub fn getenv_bool(name: &str, default: bool) -> Result<bool> {
    match getenv(name)? {
        None => Ok(default),
        Some(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => bail!("invalid boolean in env var {name:?}: {s:?}"),
        }
    }
}

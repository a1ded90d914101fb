use std::{env, fmt::Display, str::FromStr};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads `name` from the environment and parses it, falling back to `default` if the variable is
/// unset or does not parse.
pub fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    parse_or(name, env::var(name).ok().as_deref(), default)
}

/// Parses `value`, falling back to `default` if it is missing or does not parse.
pub(crate) fn parse_or<T>(name: &str, value: Option<&str>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(value) = value else {
        return default;
    };

    match value.trim().parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("{name} has invalid value {value:?} ({e}), using default: {default}");
            default
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

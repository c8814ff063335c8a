use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{bail, Context};

use crate::room::Limits;

/// Longest accepted duration: ten years.
const MAX_SECONDS: u64 = 10 * 365 * 86_400;

/// Widget texts handed to clients at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    pub button_text_start: String,
    pub button_text_join:  String,
    pub button_color:      String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind:        SocketAddr,
    pub limits:      Limits,
    pub sweep_every: Duration,
    pub secret:      String,
    pub display:     Display,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());

        let limits = Limits {
            max_lifetime:   seconds(&get, "ANONCHAT_MAX_LIFETIME", 86_400)?,
            max_inactivity: seconds(&get, "ANONCHAT_MAX_INACTIVITY", 21_600)?,
        };
        let secret = get("ANONCHAT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| nanoid::nanoid!(32));

        Ok(Self {
            bind: parse(&get, "ANONCHAT_BIND", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            limits,
            sweep_every: Duration::from_secs(seconds(&get, "ANONCHAT_SWEEP_SECS", 30)?),
            secret,
            display: Display {
                button_text_start: text("ANONCHAT_BUTTON_TEXT_START", "Start Chat"),
                button_text_join:  text("ANONCHAT_BUTTON_TEXT_JOIN", "Join Chat"),
                button_color:      text("ANONCHAT_BUTTON_COLOR", "#0073aa"),
            },
        })
    }
}

fn parse<T, F>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key}={raw:?}")),
        None => Ok(default),
    }
}

fn seconds<F>(get: &F, key: &str, default: u64) -> anyhow::Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let v = parse(get, key, default)?;
    if v == 0 {
        bail!("{key} must be greater than zero");
    }
    if v > MAX_SECONDS {
        bail!("{key} must be at most {MAX_SECONDS} seconds");
    }
    Ok(v)
}

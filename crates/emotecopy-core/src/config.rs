use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{copier::CopyPolicy, errors::Error, Result};

pub const DEFAULT_GQL_ENDPOINT: &str = "https://7tv.io/v4/gql";
pub const DEFAULT_TOKEN_FILE: &str = "token.txt";

/// Typed configuration, resolved from the environment (and an optional `.env`).
///
/// CLI flags override these values in the binary.
#[derive(Clone, Debug)]
pub struct Config {
    // Remote API
    pub gql_endpoint: String,
    pub request_timeout: Duration,

    // Credentials
    pub token: Option<String>,
    pub token_file: PathBuf,

    // Backoff / abort policy
    pub fallback_backoff: Duration,
    pub max_backoff: Duration,
    pub max_consecutive_auth_failures: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let str_of = |key: &str| lookup(key).and_then(non_empty);
        let u64_of = |key: &str| -> Result<Option<u64>> {
            match str_of(key) {
                None => Ok(None),
                Some(v) => v.trim().parse::<u64>().map(Some).map_err(|_| {
                    Error::Config(format!("{key} must be a non-negative integer, got {v:?}"))
                }),
            }
        };

        let gql_endpoint =
            str_of("EMOTECOPY_GQL_ENDPOINT").unwrap_or_else(|| DEFAULT_GQL_ENDPOINT.to_string());
        if !gql_endpoint.starts_with("http://") && !gql_endpoint.starts_with("https://") {
            return Err(Error::Config(format!(
                "EMOTECOPY_GQL_ENDPOINT must be an http(s) URL, got {gql_endpoint:?}"
            )));
        }
        let request_timeout =
            Duration::from_millis(u64_of("EMOTECOPY_REQUEST_TIMEOUT_MS")?.unwrap_or(10_000));

        let token = str_of("EMOTECOPY_TOKEN").map(|t| t.trim().to_string());
        let token_file = str_of("EMOTECOPY_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE));

        let fallback_backoff =
            Duration::from_secs(u64_of("EMOTECOPY_FALLBACK_BACKOFF_SECS")?.unwrap_or(45));
        let max_backoff = Duration::from_secs(u64_of("EMOTECOPY_MAX_BACKOFF_SECS")?.unwrap_or(300));
        if max_backoff < fallback_backoff {
            return Err(Error::Config(
                "EMOTECOPY_MAX_BACKOFF_SECS must not be smaller than EMOTECOPY_FALLBACK_BACKOFF_SECS"
                    .to_string(),
            ));
        }
        let max_consecutive_auth_failures = u64_of("EMOTECOPY_MAX_AUTH_FAILURES")?
            .unwrap_or(3)
            .min(u64::from(u32::MAX)) as u32;

        Ok(Self {
            gql_endpoint,
            request_timeout,
            token,
            token_file,
            fallback_backoff,
            max_backoff,
            max_consecutive_auth_failures,
        })
    }

    pub fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy {
            fallback_backoff: self.fallback_backoff,
            max_backoff: self.max_backoff,
            max_consecutive_auth_failures: self.max_consecutive_auth_failures,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.gql_endpoint, DEFAULT_GQL_ENDPOINT);
        assert_eq!(cfg.token, None);
        assert_eq!(cfg.token_file, PathBuf::from("token.txt"));
        assert_eq!(cfg.fallback_backoff, Duration::from_secs(45));
        assert_eq!(cfg.max_backoff, Duration::from_secs(300));
        assert_eq!(cfg.max_consecutive_auth_failures, 3);
        assert_eq!(cfg.request_timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn env_values_override_defaults() {
        let cfg = Config::from_lookup(lookup(&[
            ("EMOTECOPY_GQL_ENDPOINT", "http://localhost:9000/gql"),
            ("EMOTECOPY_TOKEN", "  abc.def.ghi  "),
            ("EMOTECOPY_FALLBACK_BACKOFF_SECS", "5"),
            ("EMOTECOPY_MAX_BACKOFF_SECS", "10"),
            ("EMOTECOPY_MAX_AUTH_FAILURES", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.gql_endpoint, "http://localhost:9000/gql");
        assert_eq!(cfg.token.as_deref(), Some("abc.def.ghi"));
        assert_eq!(cfg.copy_policy().fallback_backoff, Duration::from_secs(5));
        assert_eq!(cfg.copy_policy().max_backoff, Duration::from_secs(10));
        assert_eq!(cfg.copy_policy().max_consecutive_auth_failures, 0);
    }

    #[test]
    fn rejects_bad_numbers_and_urls() {
        let err = Config::from_lookup(lookup(&[("EMOTECOPY_MAX_BACKOFF_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("EMOTECOPY_MAX_BACKOFF_SECS")));

        let err = Config::from_lookup(lookup(&[("EMOTECOPY_GQL_ENDPOINT", "7tv.io")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup(&[
            ("EMOTECOPY_FALLBACK_BACKOFF_SECS", "60"),
            ("EMOTECOPY_MAX_BACKOFF_SECS", "30"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn dotenv_parsing_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv(
            "# comment\n\nEMOTECOPY_TOKEN=\"a.b.c\"\nbroken line\n =x\nEMOTECOPY_TOKEN_FILE='t.txt'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("EMOTECOPY_TOKEN".to_string(), "a.b.c".to_string()),
                ("EMOTECOPY_TOKEN_FILE".to_string(), "t.txt".to_string()),
            ]
        );
    }
}

//! Provider credentials, read from the environment once at startup.
//!
//! Passwords never reach a log line: [`Login`] has a redacting `Debug`.

use std::fmt;

use ocean_common::{PipelineError, PipelineResult, Provider};

use crate::config::Destination;

pub const CMEMS_USERNAME: &str = "CMEMS_USERNAME";
pub const CMEMS_PASSWORD: &str = "CMEMS_PASSWORD";
pub const SWOT_USERNAME: &str = "SWOT_USERNAME";
pub const SWOT_PASSWORD: &str = "SWOT_PASSWORD";
pub const IFREMER_USERNAME: &str = "IFREMER_USERNAME";
pub const IFREMER_PASSWORD: &str = "IFREMER_PASSWORD";

#[derive(Clone, PartialEq, Eq)]
pub struct Login {
    pub username: String,
    pub password: String,
}

impl Login {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    cmems: Option<Login>,
    swot: Option<Login>,
    ifremer: Option<Login>,
}

impl Credentials {
    pub fn new(cmems: Option<Login>, swot: Option<Login>, ifremer: Option<Login>) -> Self {
        Self { cmems, swot, ifremer }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. A pair counts only when both halves are
    /// present and non-empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pair = |user: &str, pass: &str| match (lookup(user), lookup(pass)) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Login::new(u, p)),
            _ => None,
        };
        Self {
            cmems: pair(CMEMS_USERNAME, CMEMS_PASSWORD),
            swot: pair(SWOT_USERNAME, SWOT_PASSWORD),
            ifremer: pair(IFREMER_USERNAME, IFREMER_PASSWORD),
        }
    }

    pub fn for_provider(&self, provider: Provider) -> Option<&Login> {
        match provider {
            Provider::Cmems => self.cmems.as_ref(),
            Provider::Swot => self.swot.as_ref(),
        }
    }

    /// Login for the configured destination. Selecting a destination without
    /// its credentials is a configuration error.
    pub fn for_destination(&self, destination: Destination) -> PipelineResult<Option<&Login>> {
        match destination {
            Destination::None => Ok(None),
            Destination::Ifremer => self.ifremer.as_ref().map(Some).ok_or_else(|| {
                PipelineError::Config(format!(
                    "destination ifremer selected but {} / {} are not set",
                    IFREMER_USERNAME, IFREMER_PASSWORD
                ))
            }),
        }
    }

    /// Providers with a usable login, for the startup log line.
    pub fn available(&self) -> Vec<&'static str> {
        [
            ("cmems", self.cmems.is_some()),
            ("swot", self.swot.is_some()),
            ("ifremer", self.ifremer.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_debug_never_shows_password() {
        let login = Login::new("alice", "hunter2");
        let shown = format!("{:?}", login);
        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));

        let creds = Credentials::new(Some(login), None, None);
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_pairs_need_both_halves() {
        let creds = Credentials::from_lookup(lookup(&[
            (CMEMS_USERNAME, "u"),
            (CMEMS_PASSWORD, "p"),
            (SWOT_USERNAME, "u"),
            (SWOT_PASSWORD, ""),
            (IFREMER_PASSWORD, "p"),
        ]));
        assert_eq!(creds.for_provider(Provider::Cmems), Some(&Login::new("u", "p")));
        assert!(creds.for_provider(Provider::Swot).is_none());
        assert_eq!(creds.available(), vec!["cmems"]);
    }

    #[test]
    fn test_destination_requires_login() {
        let creds = Credentials::default();
        assert!(creds.for_destination(Destination::None).unwrap().is_none());
        assert!(matches!(
            creds.for_destination(Destination::Ifremer),
            Err(PipelineError::Config(_))
        ));

        let creds = Credentials::new(None, None, Some(Login::new("ftp", "secret")));
        assert!(creds.for_destination(Destination::Ifremer).unwrap().is_some());
    }
}

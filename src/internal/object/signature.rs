//! Author/committer identity lines embedded in a commit object, in Git's
//! `Name <email> timestamp tz-offset` wire format.

use std::fmt::{self, Display};

use crate::errors::AvcError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// e.g. `+0000`, `-0700`.
    pub tz_offset: String,
}

impl Signature {
    pub fn new(name: String, email: String, timestamp: i64, tz_offset: String) -> Self {
        Signature {
            name,
            email,
            timestamp,
            tz_offset,
        }
    }

    /// Resolve an identity from `AVC_AUTHOR_NAME`/`AVC_AUTHOR_EMAIL`,
    /// falling back to `USER`/`EMAIL`, then to fixed placeholders, with the
    /// clock pinned to `now` and a `+0000` offset.
    pub fn from_env(now: i64) -> Self {
        let name = std::env::var("AVC_AUTHOR_NAME")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_else(|_| "unknown".to_string());
        let email = std::env::var("AVC_AUTHOR_EMAIL")
            .or_else(|_| std::env::var("EMAIL"))
            .unwrap_or_else(|_| "user@example.com".to_string());
        Signature::new(name, email, now, "+0000".to_string())
    }

    pub fn to_data(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn from_data(line: &str) -> Result<Self, AvcError> {
        let open = line
            .find('<')
            .ok_or_else(|| AvcError::InvalidSignature(line.to_string()))?;
        let close = line
            .find('>')
            .ok_or_else(|| AvcError::InvalidSignature(line.to_string()))?;
        if close < open {
            return Err(AvcError::InvalidSignature(line.to_string()));
        }
        let name = line[..open].trim().to_string();
        let email = line[open + 1..close].to_string();
        let rest = line[close + 1..].trim();
        let (timestamp, tz_offset) =
            Self::parse_timestamp_and_tz(rest).ok_or_else(|| AvcError::InvalidSignature(line.to_string()))?;
        Ok(Signature::new(name, email, timestamp, tz_offset))
    }

    /// Accepts either this crate's own Unix-epoch `seconds tz` pair or an
    /// ISO-8601 `YYYY-MM-DD HH:MM:SS tz` triple (as some Git tooling emits),
    /// normalizing either to a Unix timestamp plus the trailing tz token.
    fn parse_timestamp_and_tz(rest: &str) -> Option<(i64, String)> {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        match tokens.as_slice() {
            [ts, tz] => Some((ts.parse().ok()?, tz.to_string())),
            [date, time, tz] => {
                let combined = format!("{date} {time} {tz}");
                let parsed = chrono::DateTime::parse_from_str(&combined, "%Y-%m-%d %H:%M:%S %z").ok()?;
                Some((parsed.timestamp(), tz.to_string()))
            }
            _ => None,
        }
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name, self.email, self.timestamp, self.tz_offset
        )
    }
}

//! # DID Parsing and Resolution
//!
//! A DID has the shape `did:<method>:<identifier>`. The parser treats the
//! identifier as opaque; the method-specific resolvers interpret it and
//! produce a 32-byte Ed25519 public key.
//!
//! Supported methods are `key` (offline) and `web` (fetched under a
//! budget).
//!
//! See:
//!
//! - <https://www.w3.org/TR/did-core/>
//! - <https://w3c-ccg.github.io/did-method-key>
//! - <https://w3c-ccg.github.io/did-method-web/>

pub mod key;
pub mod web;

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use ed25519_dalek::VerifyingKey;
use regex::Regex;

use crate::error::Error;
use crate::fetch::{FetchBudget, HttpFetch};

static DID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^did:(?<method>[a-z0-9]+):(?<identifier>[A-Za-z0-9._%:-]+)$")
        .expect("should compile")
});

/// DID methods supported by this crate.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Method {
    /// `did:key`
    #[default]
    Key,

    /// `did:web`
    Web,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "key" => Ok(Self::Key),
            "web" => Ok(Self::Web),
            _ => Err(Error::UnsupportedDidMethod(s.to_string())),
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Web => write!(f, "web"),
        }
    }
}

/// A parsed DID.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Did {
    /// DID method.
    pub method: Method,

    /// Method-specific identifier, opaque at this level.
    pub identifier: String,
}

impl Did {
    /// Parse a DID string into its components.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for a malformed DID and
    /// `UnsupportedDidMethod` for a well-formed DID whose method this
    /// crate does not resolve.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let Some(caps) = DID_REGEX.captures(s) else {
            return Err(Error::InvalidRequest(format!("invalid DID: {s}")));
        };
        let method = Method::from_str(&caps["method"])?;
        Ok(Self { method, identifier: caps["identifier"].to_string() })
    }
}

impl Display for Did {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "did:{}:{}", self.method, self.identifier)
    }
}

/// Resolve a DID or DID URL to the agent's Ed25519 public key.
///
/// A fragment, if present, is retained as the verification method hint for
/// `did:web` documents and ignored for `did:key`.
///
/// # Errors
///
/// Returns `UnsupportedDidMethod` for unknown methods and
/// `DidResolutionFailed` for any method-specific failure.
pub async fn resolve_key(
    did_url: &str, fetcher: &impl HttpFetch, budget: FetchBudget,
) -> crate::Result<VerifyingKey> {
    let (did_part, fragment) = match did_url.split_once('#') {
        Some((did, _)) => (did, Some(did_url)),
        None => (did_url, None),
    };
    let did = Did::parse(did_part)?;
    match did.method {
        Method::Key => key::resolve(&did),
        Method::Web => web::resolve(&did, fragment, fetcher, budget).await,
    }
}

//! ICRC ledger accounts
//!
//! An account is an owning principal plus an optional 32 byte subaccount. Each
//! link keeps its funds in a vault account owned by the link authority whose
//! subaccount is derived from the link id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Textual principal identifier of a user, canister or ledger
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    /// Principal as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Principal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidPrincipal(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for Principal {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<Principal> for String {
    fn from(value: Principal) -> Self {
        value.0
    }
}

/// 32 byte ledger subaccount
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subaccount(pub [u8; 32]);

impl Subaccount {
    /// Default subaccount, all zero
    pub const DEFAULT: Self = Self([0u8; 32]);

    /// Derive the vault subaccount of a link
    ///
    /// The 16 raw bytes of the link's UUID followed by 16 zero bytes.
    pub fn from_link_id(link_id: &str) -> Result<Self, Error> {
        let uuid =
            Uuid::parse_str(link_id).map_err(|_| Error::InvalidLinkId(link_id.to_string()))?;

        Ok(Self(pad_uuid(&uuid)))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Subaccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Derive the 32 byte subaccount holding a link's funds
pub fn link_id_to_subaccount(link_id: &str) -> Result<Subaccount, Error> {
    Subaccount::from_link_id(link_id)
}

/// Transfer memo for a transaction: its UUID bytes followed by 16 zero bytes
pub fn transaction_memo(transaction_id: &Uuid) -> [u8; 32] {
    pad_uuid(transaction_id)
}

fn pad_uuid(uuid: &Uuid) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[..16].copy_from_slice(uuid.as_bytes());
    buf
}

/// ICRC account
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Owning principal
    pub owner: Principal,
    /// Subaccount, `None` is the default subaccount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaccount: Option<Subaccount>,
}

impl Account {
    /// Account on the default subaccount
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            subaccount: None,
        }
    }

    /// Vault account that holds the funds of `link_id`
    pub fn link_vault(authority: &Principal, link_id: &str) -> Result<Self, Error> {
        Ok(Self {
            owner: authority.clone(),
            subaccount: Some(Subaccount::from_link_id(link_id)?),
        })
    }

    /// Subaccount with the default filled in
    pub fn effective_subaccount(&self) -> Subaccount {
        self.subaccount.unwrap_or(Subaccount::DEFAULT)
    }
}

// An explicit all-zero subaccount is the same account as no subaccount.
impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.effective_subaccount() == other.effective_subaccount()
    }
}

impl std::hash::Hash for Account {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.effective_subaccount().hash(state);
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subaccount {
            Some(sub) if sub != Subaccount::DEFAULT => write!(f, "{}.{}", self.owner, sub),
            _ => write!(f, "{}", self.owner),
        }
    }
}

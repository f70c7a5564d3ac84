//! Item categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OpvaultError;

/// The closed set of item categories, stored on disk as 3-digit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Login,
    CreditCard,
    SecureNote,
    Identity,
    Password,
    Tombstone,
    SoftwareLicense,
    BankAccount,
    Database,
    DriverLicense,
    OutdoorLicense,
    Membership,
    Passport,
    Rewards,
    Ssn,
    Router,
    Server,
    Email,
}

impl Category {
    /// Every category, in code order.
    pub const ALL: [Category; 18] = [
        Self::Login,
        Self::CreditCard,
        Self::SecureNote,
        Self::Identity,
        Self::Password,
        Self::Tombstone,
        Self::SoftwareLicense,
        Self::BankAccount,
        Self::Database,
        Self::DriverLicense,
        Self::OutdoorLicense,
        Self::Membership,
        Self::Passport,
        Self::Rewards,
        Self::Ssn,
        Self::Router,
        Self::Server,
        Self::Email,
    ];

    /// The on-disk code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Login => "001",
            Self::CreditCard => "002",
            Self::SecureNote => "003",
            Self::Identity => "004",
            Self::Password => "005",
            Self::Tombstone => "099",
            Self::SoftwareLicense => "100",
            Self::BankAccount => "101",
            Self::Database => "102",
            Self::DriverLicense => "103",
            Self::OutdoorLicense => "104",
            Self::Membership => "105",
            Self::Passport => "106",
            Self::Rewards => "107",
            Self::Ssn => "108",
            Self::Router => "109",
            Self::Server => "110",
            Self::Email => "111",
        }
    }

    /// Look up a category by its on-disk code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl FromStr for Category {
    type Err = OpvaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| OpvaultError::invalid(format!("unknown category code {s:?}")))
    }
}

impl TryFrom<String> for Category {
    type Error = OpvaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.code().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

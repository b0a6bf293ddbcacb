// homeworks/src/models/role.rs

//! Set-valued roles. A user either holds a role tag or does not; there is no hierarchy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
  Admin,
  Ceo,
  GeneralManager,
  FinanceManager,
  SalesManager,
  ScaffoldExecutiveManager,
  Contractor,
  Customer,
  /// Tags this build does not know about are kept verbatim.
  Other(String),
}

/// Roles allowed to sign in as another user.
pub const IMPERSONATORS: &[Role] = &[Role::Admin, Role::Ceo, Role::GeneralManager];

/// Roles that see every order, not only their own.
pub const STAFF: &[Role] = &[
  Role::Admin,
  Role::Ceo,
  Role::GeneralManager,
  Role::FinanceManager,
  Role::SalesManager,
  Role::ScaffoldExecutiveManager,
];

impl Role {
  pub fn as_str(&self) -> &str {
    match self {
      Role::Admin => "admin",
      Role::Ceo => "ceo",
      Role::GeneralManager => "general_manager",
      Role::FinanceManager => "finance_manager",
      Role::SalesManager => "sales_manager",
      Role::ScaffoldExecutiveManager => "scaffold_executive_manager",
      Role::Contractor => "contractor",
      Role::Customer => "customer",
      Role::Other(tag) => tag.as_str(),
    }
  }

  // Lower is more privileged. Unknown tags rank last.
  fn rank(&self) -> u8 {
    match self {
      Role::Admin => 0,
      Role::Ceo => 1,
      Role::GeneralManager => 2,
      Role::FinanceManager => 3,
      Role::SalesManager => 4,
      Role::ScaffoldExecutiveManager => 5,
      Role::Contractor => 6,
      Role::Customer => 7,
      Role::Other(_) => u8::MAX,
    }
  }
}

impl From<&str> for Role {
  fn from(tag: &str) -> Self {
    match tag.trim() {
      "admin" => Role::Admin,
      "ceo" => Role::Ceo,
      "general_manager" => Role::GeneralManager,
      "finance_manager" => Role::FinanceManager,
      "sales_manager" => Role::SalesManager,
      "scaffold_executive_manager" => Role::ScaffoldExecutiveManager,
      "contractor" => Role::Contractor,
      "customer" => Role::Customer,
      other => Role::Other(other.to_string()),
    }
  }
}

impl From<String> for Role {
  fn from(tag: String) -> Self {
    Role::from(tag.as_str())
  }
}

impl From<Role> for String {
  fn from(role: Role) -> Self {
    role.as_str().to_string()
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_tags<I, S>(tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self(tags.into_iter().map(|t| Role::from(t.as_ref())).collect())
  }

  pub fn insert(&mut self, role: Role) -> bool {
    self.0.insert(role)
  }

  pub fn has(&self, role: &Role) -> bool {
    self.0.contains(role)
  }

  pub fn has_any(&self, roles: &[Role]) -> bool {
    roles.iter().any(|r| self.0.contains(r))
  }

  pub fn has_tag(&self, tag: &str) -> bool {
    self.has(&Role::from(tag))
  }

  pub fn is_staff(&self) -> bool {
    self.has_any(STAFF)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Role> {
    self.0.iter()
  }

  /// The most privileged role held, used to choose which view a user lands on.
  pub fn primary(&self) -> Option<&Role> {
    self.0.iter().min_by_key(|r| r.rank())
  }

  pub fn tags(&self) -> Vec<String> {
    self.0.iter().map(|r| r.as_str().to_string()).collect()
  }
}

impl FromIterator<Role> for RoleSet {
  fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}

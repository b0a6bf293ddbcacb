// homeworks/src/pipelines/contexts.rs

//! Context structs of the registered pipelines. Handlers receive them wrapped in
//! `stagehand::ContextData`; the HTTP handler reads the filled-in slots back after the run.

use crate::models::approval::{Approval, ApprovalOutcome, ApprovalProgress};
use crate::models::order::{Order, OrderStatus};
use crate::models::role::RoleSet;
use crate::models::session::{Session, SessionTokens};
use crate::models::user::User;
use crate::services::auth_service::Principal;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Who is asking for a change. `System` is the server itself (payment callbacks).
#[derive(Debug, Clone)]
pub enum Actor {
  User(Principal),
  System,
}

impl Actor {
  pub fn user_id(&self) -> Option<Uuid> {
    match self {
      Actor::User(p) => Some(p.user.id),
      Actor::System => None,
    }
  }

  pub fn roles(&self) -> Option<&RoleSet> {
    match self {
      Actor::User(p) => Some(&p.roles),
      Actor::System => None,
    }
  }
}

#[derive(Clone)]
pub struct ApprovalCtxData {
  pub app_state: AppState,
  pub order_id: Uuid,
  pub role: String,
  pub actor: Principal,
  pub now: DateTime<Utc>,
  // Filled in by the pipeline:
  pub order: Option<Order>,
  pub outcome: Option<ApprovalOutcome>,
  pub ledger: Vec<Approval>,
  pub progress: ApprovalProgress,
  pub advanced_to: Option<OrderStatus>,
  pub customer_notified: bool,
}

impl ApprovalCtxData {
  pub fn new(app_state: AppState, order_id: Uuid, role: String, actor: Principal, now: DateTime<Utc>) -> Self {
    Self {
      app_state,
      order_id,
      role,
      actor,
      now,
      order: None,
      outcome: None,
      ledger: Vec::new(),
      progress: ApprovalProgress::default(),
      advanced_to: None,
      customer_notified: false,
    }
  }
}

#[derive(Clone)]
pub struct StatusChangeCtxData {
  pub app_state: AppState,
  pub order_id: Uuid,
  pub target: OrderStatus,
  pub actor: Actor,
  pub reason: Option<String>,
  // Filled in by the pipeline:
  pub order: Option<Order>,
  pub previous_status: Option<OrderStatus>,
  pub ledger: Vec<Approval>,
  pub customer_notified: bool,
}

impl StatusChangeCtxData {
  pub fn new(app_state: AppState, order_id: Uuid, target: OrderStatus, actor: Actor, reason: Option<String>) -> Self {
    Self {
      app_state,
      order_id,
      target,
      actor,
      reason,
      order: None,
      previous_status: None,
      ledger: Vec::new(),
      customer_notified: false,
    }
  }
}

#[derive(Clone)]
pub struct ImpersonationCtxData {
  pub app_state: AppState,
  pub caller_token: String,
  pub target_user_id: Uuid,
  pub now: DateTime<Utc>,
  // Filled in by the pipeline:
  pub caller: Option<Principal>,
  pub target: Option<User>,
  pub minted_session: Option<Session>,
  pub tokens: Option<SessionTokens>,
}

impl ImpersonationCtxData {
  pub fn new(app_state: AppState, caller_token: String, target_user_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      app_state,
      caller_token,
      target_user_id,
      now,
      caller: None,
      target: None,
      minted_session: None,
      tokens: None,
    }
  }
}

#[derive(Clone)]
pub struct OtpLoginCtxData {
  pub app_state: AppState,
  pub raw_phone: String,
  pub code: String,
  pub full_name: Option<String>,
  pub now: DateTime<Utc>,
  // Filled in by the pipeline:
  pub phone: Option<String>,
  pub user: Option<User>,
  pub roles: RoleSet,
  pub registered: bool,
  pub tokens: Option<SessionTokens>,
}

impl OtpLoginCtxData {
  pub fn new(app_state: AppState, raw_phone: String, code: String, full_name: Option<String>, now: DateTime<Utc>) -> Self {
    Self {
      app_state,
      raw_phone,
      code,
      full_name,
      now,
      phone: None,
      user: None,
      roles: RoleSet::new(),
      registered: false,
      tokens: None,
    }
  }
}

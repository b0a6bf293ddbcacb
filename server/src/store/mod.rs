// homeworks/src/store/mod.rs

//! Persistence seam. Every backend implements the per-entity traits below;
//! the rest of the service holds an `Arc<dyn Store>`.

use crate::errors::Result;
use crate::models::approval::Approval;
use crate::models::audit::{AuditEntry, NewAuditEntry};
use crate::models::daily_report::DailyReportVersion;
use crate::models::module::{Module, ModuleVersion};
use crate::models::notification::{NewNotification, Notification};
use crate::models::order::{NewOrder, Order, OrderFilter, OrderStatus};
use crate::models::otp::{OtpCode, OtpPurpose};
use crate::models::payment::{Payment, PaymentStatus};
use crate::models::report_lock::ReportLock;
use crate::models::role::{Role, RoleSet};
use crate::models::session::{NewSession, Session, SessionRotation};
use crate::models::user::User;
use crate::models::whitelist::{NewWhitelistEntry, WhitelistEntry};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Next value of the service-code sequence.
  async fn next_order_sequence(&self) -> Result<i64>;
  async fn insert_order(&self, new_order: NewOrder, code: String) -> Result<Order>;
  async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
  async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>>;
  /// Moves the order to `status` only while it is still in `expected`. Returns the
  /// re-read row, `None` when the order is missing or its status has moved on.
  async fn update_order_status(&self, id: Uuid, expected: OrderStatus, status: OrderStatus) -> Result<Option<Order>>;
  async fn archive_order(&self, id: Uuid) -> Result<Option<Order>>;
  async fn assign_contractor(&self, id: Uuid, contractor_id: Uuid) -> Result<Option<Order>>;
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
  /// Creates a pending slot per role that the order does not have yet. Returns the full ledger.
  async fn open_approval_slots(&self, order_id: Uuid, roles: &[String]) -> Result<Vec<Approval>>;
  /// Ledger rows of an order, oldest first.
  async fn list_approvals(&self, order_id: Uuid) -> Result<Vec<Approval>>;
  /// Marks the still-pending slot for `(order_id, role)`. `None` when no such slot exists.
  async fn record_approval(
    &self,
    order_id: Uuid,
    role: &str,
    user_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<Approval>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
  async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
  async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>>;
  async fn create_user(&self, phone: &str, full_name: Option<String>) -> Result<User>;
  async fn roles_for(&self, user_id: Uuid) -> Result<RoleSet>;
  async fn grant_role(&self, user_id: Uuid, role: &Role) -> Result<()>;
  /// Holders of `role`, ordered by name then phone.
  async fn list_users_with_role(&self, role: &Role) -> Result<Vec<User>>;
}

#[async_trait]
pub trait WhitelistStore: Send + Sync {
  async fn upsert_whitelist(&self, entry: NewWhitelistEntry) -> Result<WhitelistEntry>;
  async fn delete_whitelist(&self, phone: &str) -> Result<bool>;
  async fn list_whitelist(&self) -> Result<Vec<WhitelistEntry>>;
  async fn find_whitelist(&self, phone: &str) -> Result<Option<WhitelistEntry>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn insert_session(&self, new_session: NewSession) -> Result<Session>;
  async fn find_session(&self, id: Uuid) -> Result<Option<Session>>;
  async fn find_session_by_access_hash(&self, access_token_hash: &str) -> Result<Option<Session>>;
  async fn find_session_by_refresh_hash(&self, refresh_token_hash: &str) -> Result<Option<Session>>;
  /// Swaps in new token hashes while the session is unrevoked and still carries
  /// `expected_refresh_hash`. `None` when another refresh got there first.
  async fn rotate_session(
    &self,
    id: Uuid,
    expected_refresh_hash: &str,
    rotation: SessionRotation,
  ) -> Result<Option<Session>>;
  async fn revoke_session(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
  async fn insert_otp(
    &self,
    phone: &str,
    purpose: OtpPurpose,
    code_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
  ) -> Result<OtpCode>;
  /// Most recent unverified, unexpired code for the phone and purpose.
  async fn latest_pending_otp(&self, phone: &str, purpose: OtpPurpose, now: DateTime<Utc>) -> Result<Option<OtpCode>>;
  /// Marks a code verified unless it already was. Returns whether this call consumed it.
  async fn consume_otp(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
  /// Counts one wrong guess against the code; returns the new total.
  async fn record_otp_failure(&self, id: Uuid) -> Result<i32>;
  /// Drops a code that never reached the phone, so it does not count against the limits.
  async fn delete_otp(&self, id: Uuid) -> Result<()>;
  async fn count_otps_since(&self, phone: &str, since: DateTime<Utc>) -> Result<i64>;
  async fn last_otp_sent_at(&self, phone: &str) -> Result<Option<DateTime<Utc>>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
  async fn insert_notification(&self, new_notification: NewNotification) -> Result<Notification>;
  async fn list_notifications(&self, recipient_id: Uuid, limit: i64) -> Result<Vec<Notification>>;
  /// Sets `read_at` once; later calls keep the first timestamp. `None` when the
  /// notification does not exist or belongs to someone else.
  async fn mark_notification_read(&self, recipient_id: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<Option<Notification>>;
  async fn unread_count(&self, recipient_id: Uuid) -> Result<i64>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
  async fn insert_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry>;
  async fn list_audit(&self, limit: i64) -> Result<Vec<AuditEntry>>;
}

#[async_trait]
pub trait ReportLockStore: Send + Sync {
  /// `AppError::Conflict` when the date is already locked.
  async fn insert_report_lock(&self, order_id: Uuid, report_date: NaiveDate, locked_by: Uuid) -> Result<ReportLock>;
  async fn delete_report_lock(&self, order_id: Uuid, report_date: NaiveDate) -> Result<bool>;
  async fn list_report_locks(&self, order_id: Uuid) -> Result<Vec<ReportLock>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
  async fn insert_payment(&self, order_id: Uuid, authority: &str, amount: i64) -> Result<Payment>;
  async fn find_payment_by_authority(&self, authority: &str) -> Result<Option<Payment>>;
  async fn update_payment(&self, id: Uuid, status: PaymentStatus, ref_id: Option<String>) -> Result<Option<Payment>>;
}

#[async_trait]
pub trait ModuleStore: Send + Sync {
  async fn create_module(&self, name: &str) -> Result<Module>;
  async fn find_module(&self, id: Uuid) -> Result<Option<Module>>;
  async fn delete_module(&self, id: Uuid) -> Result<bool>;
  /// Stores `content` as the module's next version (1, 2, ...).
  async fn save_module_version(&self, module_id: Uuid, content: serde_json::Value, saved_by: Uuid) -> Result<ModuleVersion>;
  /// Newest first.
  async fn list_module_versions(&self, module_id: Uuid) -> Result<Vec<ModuleVersion>>;
}

#[async_trait]
pub trait DailyReportStore: Send + Sync {
  /// Stores the next version of one day's report. `AppError::Conflict` when the date is locked.
  async fn save_report_version(
    &self,
    order_id: Uuid,
    report_date: NaiveDate,
    content: serde_json::Value,
    author_id: Uuid,
  ) -> Result<DailyReportVersion>;
  /// Newest first.
  async fn list_report_versions(&self, order_id: Uuid, report_date: NaiveDate) -> Result<Vec<DailyReportVersion>>;
}

pub trait Store:
  OrderStore
  + ApprovalStore
  + UserStore
  + WhitelistStore
  + SessionStore
  + OtpStore
  + NotificationStore
  + AuditStore
  + ReportLockStore
  + PaymentStore
  + ModuleStore
  + DailyReportStore
{
}

impl<T> Store for T where
  T: OrderStore
    + ApprovalStore
    + UserStore
    + WhitelistStore
    + SessionStore
    + OtpStore
    + NotificationStore
    + AuditStore
    + ReportLockStore
    + PaymentStore
    + ModuleStore
    + DailyReportStore
{
}

// homeworks/src/store/memory.rs

//! In-process store used by tests and `STORE=memory`. Mirrors the Postgres
//! constraints that the service relies on (unique report locks, single-use OTPs).

use super::*;
use crate::errors::AppError;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Tables {
  order_seq: i64,
  orders: HashMap<Uuid, Order>,
  approvals: Vec<Approval>,
  users: HashMap<Uuid, User>,
  roles: HashMap<Uuid, HashSet<String>>,
  whitelist: HashMap<String, WhitelistEntry>,
  sessions: HashMap<Uuid, Session>,
  otps: Vec<OtpCode>,
  notifications: Vec<Notification>,
  audit: Vec<AuditEntry>,
  report_locks: HashMap<(Uuid, NaiveDate), ReportLock>,
  payments: HashMap<Uuid, Payment>,
  modules: HashMap<Uuid, Module>,
  module_versions: Vec<ModuleVersion>,
  report_versions: Vec<DailyReportVersion>,
}

/// Guards are never held across an await; every method does its work under one lock.
pub struct MemoryStore {
  tables: RwLock<Tables>,
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      tables: RwLock::new(Tables {
        // Service codes start at ORD-1001.
        order_seq: 1000,
        ..Tables::default()
      }),
    }
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn next_order_sequence(&self) -> Result<i64> {
    let mut t = self.tables.write();
    t.order_seq += 1;
    Ok(t.order_seq)
  }

  async fn insert_order(&self, new_order: NewOrder, code: String) -> Result<Order> {
    let mut t = self.tables.write();
    if t.orders.values().any(|o| o.code == code) {
      return Err(AppError::Conflict(format!("Order code {} already exists", code)));
    }
    let now = Utc::now();
    let order = Order {
      id: Uuid::new_v4(),
      code,
      customer_id: new_order.customer_id,
      service_id: new_order.service_id,
      location: new_order.location,
      status: OrderStatus::Draft,
      payment_amount: new_order.payment_amount,
      contractor_id: None,
      archived: false,
      created_at: now,
      updated_at: now,
    };
    t.orders.insert(order.id, order.clone());
    Ok(order)
  }

  async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
    Ok(self.tables.read().orders.get(&id).cloned())
  }

  async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
    let t = self.tables.read();
    let mut orders: Vec<Order> = t
      .orders
      .values()
      .filter(|o| filter.include_archived || !o.archived)
      .filter(|o| filter.customer_id.map_or(true, |c| o.customer_id == c))
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
  }

  async fn update_order_status(&self, id: Uuid, expected: OrderStatus, status: OrderStatus) -> Result<Option<Order>> {
    let mut t = self.tables.write();
    Ok(t.orders.get_mut(&id).filter(|o| o.status == expected).map(|o| {
      o.status = status;
      o.updated_at = Utc::now();
      o.clone()
    }))
  }

  async fn archive_order(&self, id: Uuid) -> Result<Option<Order>> {
    let mut t = self.tables.write();
    Ok(t.orders.get_mut(&id).map(|o| {
      o.archived = true;
      o.updated_at = Utc::now();
      o.clone()
    }))
  }

  async fn assign_contractor(&self, id: Uuid, contractor_id: Uuid) -> Result<Option<Order>> {
    let mut t = self.tables.write();
    Ok(t.orders.get_mut(&id).map(|o| {
      o.contractor_id = Some(contractor_id);
      o.updated_at = Utc::now();
      o.clone()
    }))
  }
}

#[async_trait]
impl ApprovalStore for MemoryStore {
  async fn open_approval_slots(&self, order_id: Uuid, roles: &[String]) -> Result<Vec<Approval>> {
    let mut t = self.tables.write();
    for role in roles {
      let exists = t
        .approvals
        .iter()
        .any(|a| a.order_id == order_id && &a.approver_role == role);
      if !exists {
        t.approvals.push(Approval {
          id: Uuid::new_v4(),
          order_id,
          approver_role: role.clone(),
          approver_user_id: None,
          approved_at: None,
          created_at: Utc::now(),
        });
      }
    }
    Ok(t.approvals.iter().filter(|a| a.order_id == order_id).cloned().collect())
  }

  async fn list_approvals(&self, order_id: Uuid) -> Result<Vec<Approval>> {
    // Insertion order is creation order.
    Ok(
      self
        .tables
        .read()
        .approvals
        .iter()
        .filter(|a| a.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn record_approval(
    &self,
    order_id: Uuid,
    role: &str,
    user_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<Approval>> {
    let mut t = self.tables.write();
    Ok(
      t.approvals
        .iter_mut()
        .find(|a| a.order_id == order_id && a.approver_role == role && a.approved_at.is_none())
        .map(|a| {
          a.approver_user_id = Some(user_id);
          a.approved_at = Some(at);
          a.clone()
        }),
    )
  }
}

#[async_trait]
impl UserStore for MemoryStore {
  async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
    Ok(self.tables.read().users.get(&id).cloned())
  }

  async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
    Ok(self.tables.read().users.values().find(|u| u.phone == phone).cloned())
  }

  async fn create_user(&self, phone: &str, full_name: Option<String>) -> Result<User> {
    let mut t = self.tables.write();
    if t.users.values().any(|u| u.phone == phone) {
      return Err(AppError::Conflict(format!("A user with phone {} already exists", phone)));
    }
    let user = User {
      id: Uuid::new_v4(),
      phone: phone.to_string(),
      full_name,
      created_at: Utc::now(),
    };
    t.users.insert(user.id, user.clone());
    Ok(user)
  }

  async fn roles_for(&self, user_id: Uuid) -> Result<RoleSet> {
    Ok(
      self
        .tables
        .read()
        .roles
        .get(&user_id)
        .map(RoleSet::from_tags)
        .unwrap_or_default(),
    )
  }

  async fn grant_role(&self, user_id: Uuid, role: &Role) -> Result<()> {
    self
      .tables
      .write()
      .roles
      .entry(user_id)
      .or_default()
      .insert(role.as_str().to_string());
    Ok(())
  }

  async fn list_users_with_role(&self, role: &Role) -> Result<Vec<User>> {
    let t = self.tables.read();
    let mut users: Vec<User> = t
      .roles
      .iter()
      .filter(|(_, tags)| tags.contains(role.as_str()))
      .filter_map(|(id, _)| t.users.get(id).cloned())
      .collect();
    users.sort_by(|a, b| (&a.full_name, &a.phone).cmp(&(&b.full_name, &b.phone)));
    Ok(users)
  }
}

#[async_trait]
impl WhitelistStore for MemoryStore {
  async fn upsert_whitelist(&self, entry: NewWhitelistEntry) -> Result<WhitelistEntry> {
    let mut t = self.tables.write();
    let created_at = t.whitelist.get(&entry.phone).map_or_else(Utc::now, |e| e.created_at);
    let row = WhitelistEntry {
      phone: entry.phone.clone(),
      allowed_roles: entry.allowed_roles,
      notes: entry.notes,
      created_at,
    };
    t.whitelist.insert(entry.phone, row.clone());
    Ok(row)
  }

  async fn delete_whitelist(&self, phone: &str) -> Result<bool> {
    Ok(self.tables.write().whitelist.remove(phone).is_some())
  }

  async fn list_whitelist(&self) -> Result<Vec<WhitelistEntry>> {
    let mut rows: Vec<_> = self.tables.read().whitelist.values().cloned().collect();
    rows.sort_by(|a, b| a.phone.cmp(&b.phone));
    Ok(rows)
  }

  async fn find_whitelist(&self, phone: &str) -> Result<Option<WhitelistEntry>> {
    Ok(self.tables.read().whitelist.get(phone).cloned())
  }
}

#[async_trait]
impl SessionStore for MemoryStore {
  async fn insert_session(&self, new_session: NewSession) -> Result<Session> {
    let session = Session {
      id: Uuid::new_v4(),
      user_id: new_session.user_id,
      access_token_hash: new_session.access_token_hash,
      refresh_token_hash: new_session.refresh_token_hash,
      access_expires_at: new_session.access_expires_at,
      refresh_expires_at: new_session.refresh_expires_at,
      impersonator_session_id: new_session.impersonator_session_id,
      revoked: false,
      created_at: Utc::now(),
    };
    self.tables.write().sessions.insert(session.id, session.clone());
    Ok(session)
  }

  async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
    Ok(self.tables.read().sessions.get(&id).cloned())
  }

  async fn find_session_by_access_hash(&self, access_token_hash: &str) -> Result<Option<Session>> {
    Ok(
      self
        .tables
        .read()
        .sessions
        .values()
        .find(|s| s.access_token_hash == access_token_hash)
        .cloned(),
    )
  }

  async fn find_session_by_refresh_hash(&self, refresh_token_hash: &str) -> Result<Option<Session>> {
    Ok(
      self
        .tables
        .read()
        .sessions
        .values()
        .find(|s| s.refresh_token_hash == refresh_token_hash)
        .cloned(),
    )
  }

  async fn rotate_session(
    &self,
    id: Uuid,
    expected_refresh_hash: &str,
    rotation: SessionRotation,
  ) -> Result<Option<Session>> {
    let mut t = self.tables.write();
    Ok(
      t.sessions
        .get_mut(&id)
        .filter(|s| !s.revoked && s.refresh_token_hash == expected_refresh_hash)
        .map(|s| {
          s.access_token_hash = rotation.access_token_hash;
          s.refresh_token_hash = rotation.refresh_token_hash;
          s.access_expires_at = rotation.access_expires_at;
          s.refresh_expires_at = rotation.refresh_expires_at;
          s.clone()
        }),
    )
  }

  async fn revoke_session(&self, id: Uuid) -> Result<()> {
    if let Some(s) = self.tables.write().sessions.get_mut(&id) {
      s.revoked = true;
    }
    Ok(())
  }
}

#[async_trait]
impl OtpStore for MemoryStore {
  async fn insert_otp(
    &self,
    phone: &str,
    purpose: OtpPurpose,
    code_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
  ) -> Result<OtpCode> {
    let otp = OtpCode {
      id: Uuid::new_v4(),
      phone: phone.to_string(),
      purpose,
      code_hash,
      expires_at,
      verified_at: None,
      failed_attempts: 0,
      created_at,
    };
    self.tables.write().otps.push(otp.clone());
    Ok(otp)
  }

  async fn latest_pending_otp(&self, phone: &str, purpose: OtpPurpose, now: DateTime<Utc>) -> Result<Option<OtpCode>> {
    Ok(
      self
        .tables
        .read()
        .otps
        .iter()
        .filter(|o| o.phone == phone && o.purpose == purpose && o.is_pending(now))
        .max_by_key(|o| o.created_at)
        .cloned(),
    )
  }

  async fn consume_otp(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    let mut t = self.tables.write();
    match t.otps.iter_mut().find(|o| o.id == id && o.verified_at.is_none()) {
      Some(otp) => {
        otp.verified_at = Some(at);
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn record_otp_failure(&self, id: Uuid) -> Result<i32> {
    let mut t = self.tables.write();
    let otp = t
      .otps
      .iter_mut()
      .find(|o| o.id == id)
      .ok_or_else(|| AppError::NotFound(format!("Code {} not found", id)))?;
    otp.failed_attempts += 1;
    Ok(otp.failed_attempts)
  }

  async fn delete_otp(&self, id: Uuid) -> Result<()> {
    self.tables.write().otps.retain(|o| o.id != id);
    Ok(())
  }

  async fn count_otps_since(&self, phone: &str, since: DateTime<Utc>) -> Result<i64> {
    let t = self.tables.read();
    Ok(t.otps.iter().filter(|o| o.phone == phone && o.created_at >= since).count() as i64)
  }

  async fn last_otp_sent_at(&self, phone: &str) -> Result<Option<DateTime<Utc>>> {
    let t = self.tables.read();
    Ok(t.otps.iter().filter(|o| o.phone == phone).map(|o| o.created_at).max())
  }
}

#[async_trait]
impl NotificationStore for MemoryStore {
  async fn insert_notification(&self, new_notification: NewNotification) -> Result<Notification> {
    let notification = Notification {
      id: Uuid::new_v4(),
      recipient_id: new_notification.recipient_id,
      title: new_notification.title,
      body: new_notification.body,
      link: new_notification.link,
      kind: new_notification.kind,
      read_at: None,
      created_at: Utc::now(),
    };
    self.tables.write().notifications.push(notification.clone());
    Ok(notification)
  }

  async fn list_notifications(&self, recipient_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
    let t = self.tables.read();
    let mut rows: Vec<_> = t
      .notifications
      .iter()
      .filter(|n| n.recipient_id == recipient_id)
      .cloned()
      .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows.truncate(limit.max(0) as usize);
    Ok(rows)
  }

  async fn mark_notification_read(&self, recipient_id: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<Option<Notification>> {
    let mut t = self.tables.write();
    Ok(
      t.notifications
        .iter_mut()
        .find(|n| n.id == id && n.recipient_id == recipient_id)
        .map(|n| {
          n.read_at.get_or_insert(at);
          n.clone()
        }),
    )
  }

  async fn unread_count(&self, recipient_id: Uuid) -> Result<i64> {
    let t = self.tables.read();
    Ok(
      t.notifications
        .iter()
        .filter(|n| n.recipient_id == recipient_id && n.read_at.is_none())
        .count() as i64,
    )
  }
}

#[async_trait]
impl AuditStore for MemoryStore {
  async fn insert_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
    let row = AuditEntry {
      id: Uuid::new_v4(),
      actor_id: entry.actor_id,
      action: entry.action.to_string(),
      subject_id: entry.subject_id,
      detail: entry.detail,
      created_at: Utc::now(),
    };
    self.tables.write().audit.push(row.clone());
    Ok(row)
  }

  async fn list_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
    let t = self.tables.read();
    Ok(t.audit.iter().rev().take(limit.max(0) as usize).cloned().collect())
  }
}

#[async_trait]
impl ReportLockStore for MemoryStore {
  async fn insert_report_lock(&self, order_id: Uuid, report_date: NaiveDate, locked_by: Uuid) -> Result<ReportLock> {
    let mut t = self.tables.write();
    if t.report_locks.contains_key(&(order_id, report_date)) {
      return Err(AppError::Conflict(format!("Report for {} is already locked", report_date)));
    }
    let lock = ReportLock {
      order_id,
      report_date,
      locked_by,
      locked_at: Utc::now(),
    };
    t.report_locks.insert((order_id, report_date), lock.clone());
    Ok(lock)
  }

  async fn delete_report_lock(&self, order_id: Uuid, report_date: NaiveDate) -> Result<bool> {
    Ok(self.tables.write().report_locks.remove(&(order_id, report_date)).is_some())
  }

  async fn list_report_locks(&self, order_id: Uuid) -> Result<Vec<ReportLock>> {
    let t = self.tables.read();
    let mut rows: Vec<_> = t.report_locks.values().filter(|l| l.order_id == order_id).cloned().collect();
    rows.sort_by_key(|l| l.report_date);
    Ok(rows)
  }
}

#[async_trait]
impl PaymentStore for MemoryStore {
  async fn insert_payment(&self, order_id: Uuid, authority: &str, amount: i64) -> Result<Payment> {
    let payment = Payment {
      id: Uuid::new_v4(),
      order_id,
      authority: authority.to_string(),
      amount,
      status: PaymentStatus::Initiated,
      ref_id: None,
      created_at: Utc::now(),
    };
    self.tables.write().payments.insert(payment.id, payment.clone());
    Ok(payment)
  }

  async fn find_payment_by_authority(&self, authority: &str) -> Result<Option<Payment>> {
    let t = self.tables.read();
    Ok(t.payments.values().find(|p| p.authority == authority).cloned())
  }

  async fn update_payment(&self, id: Uuid, status: PaymentStatus, ref_id: Option<String>) -> Result<Option<Payment>> {
    let mut t = self.tables.write();
    Ok(t.payments.get_mut(&id).map(|p| {
      p.status = status;
      p.ref_id = ref_id;
      p.clone()
    }))
  }
}

#[async_trait]
impl ModuleStore for MemoryStore {
  async fn create_module(&self, name: &str) -> Result<Module> {
    let module = Module {
      id: Uuid::new_v4(),
      name: name.to_string(),
      created_at: Utc::now(),
    };
    self.tables.write().modules.insert(module.id, module.clone());
    Ok(module)
  }

  async fn find_module(&self, id: Uuid) -> Result<Option<Module>> {
    Ok(self.tables.read().modules.get(&id).cloned())
  }

  async fn delete_module(&self, id: Uuid) -> Result<bool> {
    let mut t = self.tables.write();
    t.module_versions.retain(|v| v.module_id != id);
    Ok(t.modules.remove(&id).is_some())
  }

  async fn save_module_version(&self, module_id: Uuid, content: serde_json::Value, saved_by: Uuid) -> Result<ModuleVersion> {
    let mut t = self.tables.write();
    if !t.modules.contains_key(&module_id) {
      return Err(AppError::NotFound(format!("Module {} not found", module_id)));
    }
    let version = t
      .module_versions
      .iter()
      .filter(|v| v.module_id == module_id)
      .map(|v| v.version)
      .max()
      .unwrap_or(0)
      + 1;
    let row = ModuleVersion {
      id: Uuid::new_v4(),
      module_id,
      version,
      content,
      saved_by,
      created_at: Utc::now(),
    };
    t.module_versions.push(row.clone());
    Ok(row)
  }

  async fn list_module_versions(&self, module_id: Uuid) -> Result<Vec<ModuleVersion>> {
    let t = self.tables.read();
    let mut rows: Vec<_> = t.module_versions.iter().filter(|v| v.module_id == module_id).cloned().collect();
    rows.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(rows)
  }
}

#[async_trait]
impl DailyReportStore for MemoryStore {
  async fn save_report_version(
    &self,
    order_id: Uuid,
    report_date: NaiveDate,
    content: serde_json::Value,
    author_id: Uuid,
  ) -> Result<DailyReportVersion> {
    let mut t = self.tables.write();
    if t.report_locks.contains_key(&(order_id, report_date)) {
      return Err(AppError::Conflict(format!("Report for {} is locked", report_date)));
    }
    let version = t
      .report_versions
      .iter()
      .filter(|v| v.order_id == order_id && v.report_date == report_date)
      .map(|v| v.version)
      .max()
      .unwrap_or(0)
      + 1;
    let row = DailyReportVersion {
      id: Uuid::new_v4(),
      order_id,
      report_date,
      version,
      content,
      author_id,
      created_at: Utc::now(),
    };
    t.report_versions.push(row.clone());
    Ok(row)
  }

  async fn list_report_versions(&self, order_id: Uuid, report_date: NaiveDate) -> Result<Vec<DailyReportVersion>> {
    let t = self.tables.read();
    let mut rows: Vec<_> = t
      .report_versions
      .iter()
      .filter(|v| v.order_id == order_id && v.report_date == report_date)
      .cloned()
      .collect();
    rows.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(rows)
  }
}

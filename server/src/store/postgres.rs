// homeworks/src/store/postgres.rs

use super::*;
use crate::errors::AppError;
use sqlx::PgPool;

const ORDER_COLUMNS: &str = "id, code, customer_id, service_id, location, status, payment_amount, contractor_id, \
                             archived, created_at, updated_at";
const APPROVAL_COLUMNS: &str = "id, order_id, approver_role, approver_user_id, approved_at, created_at";
const SESSION_COLUMNS: &str = "id, user_id, access_token_hash, refresh_token_hash, access_expires_at, \
                               refresh_expires_at, impersonator_session_id, revoked, created_at";
const OTP_COLUMNS: &str = "id, phone, purpose, code_hash, expires_at, verified_at, failed_attempts, created_at";
const MODULE_VERSION_COLUMNS: &str = "id, module_id, version, content, saved_by, created_at";
const REPORT_VERSION_COLUMNS: &str = "id, order_id, report_date, version, content, author_id, created_at";
const NOTIFICATION_COLUMNS: &str = "id, recipient_id, title, body, link, kind, read_at, created_at";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  /// Applies `migrations/` to the connected database.
  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))
  }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
  matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl OrderStore for PgStore {
  async fn next_order_sequence(&self) -> Result<i64> {
    let seq: i64 = sqlx::query_scalar("SELECT nextval('order_code_seq')")
      .fetch_one(&self.pool)
      .await?;
    Ok(seq)
  }

  async fn insert_order(&self, new_order: NewOrder, code: String) -> Result<Order> {
    let sql = format!(
      "INSERT INTO orders (code, customer_id, service_id, location, payment_amount) \
       VALUES ($1, $2, $3, $4, $5) RETURNING {}",
      ORDER_COLUMNS
    );
    sqlx::query_as::<_, Order>(&sql)
      .bind(&code)
      .bind(new_order.customer_id)
      .bind(new_order.service_id)
      .bind(new_order.location)
      .bind(new_order.payment_amount)
      .fetch_one(&self.pool)
      .await
      .map_err(|e| {
        if is_unique_violation(&e) {
          AppError::Conflict(format!("Order code {} already exists", code))
        } else {
          AppError::Sqlx(e)
        }
      })
  }

  async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders \
       WHERE ($1::uuid IS NULL OR customer_id = $1) AND ($2 OR NOT archived) \
       ORDER BY created_at DESC",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Order>(&sql)
        .bind(filter.customer_id)
        .bind(filter.include_archived)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn update_order_status(&self, id: Uuid, expected: OrderStatus, status: OrderStatus) -> Result<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3 RETURNING {}",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .bind(status)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn archive_order(&self, id: Uuid) -> Result<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET archived = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    Ok(sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn assign_contractor(&self, id: Uuid, contractor_id: Uuid) -> Result<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET contractor_id = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .bind(contractor_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }
}

#[async_trait]
impl ApprovalStore for PgStore {
  async fn open_approval_slots(&self, order_id: Uuid, roles: &[String]) -> Result<Vec<Approval>> {
    let mut tx = self.pool.begin().await?;
    for role in roles {
      sqlx::query(
        "INSERT INTO approvals (order_id, approver_role) VALUES ($1, $2) \
         ON CONFLICT (order_id, approver_role) DO NOTHING",
      )
      .bind(order_id)
      .bind(role)
      .execute(&mut *tx)
      .await?;
    }
    tx.commit().await?;
    self.list_approvals(order_id).await
  }

  async fn list_approvals(&self, order_id: Uuid) -> Result<Vec<Approval>> {
    let sql = format!(
      "SELECT {} FROM approvals WHERE order_id = $1 ORDER BY created_at, id",
      APPROVAL_COLUMNS
    );
    Ok(sqlx::query_as::<_, Approval>(&sql).bind(order_id).fetch_all(&self.pool).await?)
  }

  async fn record_approval(
    &self,
    order_id: Uuid,
    role: &str,
    user_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<Approval>> {
    let sql = format!(
      "UPDATE approvals SET approver_user_id = $3, approved_at = $4 \
       WHERE order_id = $1 AND approver_role = $2 AND approved_at IS NULL RETURNING {}",
      APPROVAL_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Approval>(&sql)
        .bind(order_id)
        .bind(role)
        .bind(user_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?,
    )
  }
}

#[async_trait]
impl UserStore for PgStore {
  async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
    Ok(
      sqlx::query_as::<_, User>("SELECT id, phone, full_name, created_at FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
    Ok(
      sqlx::query_as::<_, User>("SELECT id, phone, full_name, created_at FROM users WHERE phone = $1")
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn create_user(&self, phone: &str, full_name: Option<String>) -> Result<User> {
    sqlx::query_as::<_, User>(
      "INSERT INTO users (phone, full_name) VALUES ($1, $2) RETURNING id, phone, full_name, created_at",
    )
    .bind(phone)
    .bind(full_name)
    .fetch_one(&self.pool)
    .await
    .map_err(|e| {
      if is_unique_violation(&e) {
        AppError::Conflict(format!("A user with phone {} already exists", phone))
      } else {
        AppError::Sqlx(e)
      }
    })
  }

  async fn roles_for(&self, user_id: Uuid) -> Result<RoleSet> {
    let tags: Vec<String> = sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    Ok(RoleSet::from_tags(tags))
  }

  async fn grant_role(&self, user_id: Uuid, role: &Role) -> Result<()> {
    sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING")
      .bind(user_id)
      .bind(role.as_str())
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn list_users_with_role(&self, role: &Role) -> Result<Vec<User>> {
    Ok(
      sqlx::query_as::<_, User>(
        "SELECT u.id, u.phone, u.full_name, u.created_at FROM users u \
         JOIN user_roles r ON r.user_id = u.id WHERE r.role = $1 \
         ORDER BY u.full_name NULLS FIRST, u.phone",
      )
      .bind(role.as_str())
      .fetch_all(&self.pool)
      .await?,
    )
  }
}

#[async_trait]
impl WhitelistStore for PgStore {
  async fn upsert_whitelist(&self, entry: NewWhitelistEntry) -> Result<WhitelistEntry> {
    Ok(
      sqlx::query_as::<_, WhitelistEntry>(
        "INSERT INTO whitelist (phone, allowed_roles, notes) VALUES ($1, $2, $3) \
         ON CONFLICT (phone) DO UPDATE SET allowed_roles = EXCLUDED.allowed_roles, notes = EXCLUDED.notes \
         RETURNING phone, allowed_roles, notes, created_at",
      )
      .bind(entry.phone)
      .bind(entry.allowed_roles)
      .bind(entry.notes)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn delete_whitelist(&self, phone: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM whitelist WHERE phone = $1")
      .bind(phone)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn list_whitelist(&self) -> Result<Vec<WhitelistEntry>> {
    Ok(
      sqlx::query_as::<_, WhitelistEntry>(
        "SELECT phone, allowed_roles, notes, created_at FROM whitelist ORDER BY phone",
      )
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn find_whitelist(&self, phone: &str) -> Result<Option<WhitelistEntry>> {
    Ok(
      sqlx::query_as::<_, WhitelistEntry>(
        "SELECT phone, allowed_roles, notes, created_at FROM whitelist WHERE phone = $1",
      )
      .bind(phone)
      .fetch_optional(&self.pool)
      .await?,
    )
  }
}

#[async_trait]
impl SessionStore for PgStore {
  async fn insert_session(&self, new_session: NewSession) -> Result<Session> {
    let sql = format!(
      "INSERT INTO sessions (user_id, access_token_hash, refresh_token_hash, access_expires_at, \
       refresh_expires_at, impersonator_session_id) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
      SESSION_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Session>(&sql)
        .bind(new_session.user_id)
        .bind(new_session.access_token_hash)
        .bind(new_session.refresh_token_hash)
        .bind(new_session.access_expires_at)
        .bind(new_session.refresh_expires_at)
        .bind(new_session.impersonator_session_id)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
    let sql = format!("SELECT {} FROM sessions WHERE id = $1", SESSION_COLUMNS);
    Ok(sqlx::query_as::<_, Session>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn find_session_by_access_hash(&self, access_token_hash: &str) -> Result<Option<Session>> {
    let sql = format!("SELECT {} FROM sessions WHERE access_token_hash = $1", SESSION_COLUMNS);
    Ok(
      sqlx::query_as::<_, Session>(&sql)
        .bind(access_token_hash)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn find_session_by_refresh_hash(&self, refresh_token_hash: &str) -> Result<Option<Session>> {
    let sql = format!("SELECT {} FROM sessions WHERE refresh_token_hash = $1", SESSION_COLUMNS);
    Ok(
      sqlx::query_as::<_, Session>(&sql)
        .bind(refresh_token_hash)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn rotate_session(
    &self,
    id: Uuid,
    expected_refresh_hash: &str,
    rotation: SessionRotation,
  ) -> Result<Option<Session>> {
    let sql = format!(
      "UPDATE sessions SET access_token_hash = $3, refresh_token_hash = $4, access_expires_at = $5, \
       refresh_expires_at = $6 WHERE id = $1 AND refresh_token_hash = $2 AND NOT revoked RETURNING {}",
      SESSION_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Session>(&sql)
        .bind(id)
        .bind(expected_refresh_hash)
        .bind(rotation.access_token_hash)
        .bind(rotation.refresh_token_hash)
        .bind(rotation.access_expires_at)
        .bind(rotation.refresh_expires_at)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn revoke_session(&self, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE sessions SET revoked = TRUE WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}

#[async_trait]
impl OtpStore for PgStore {
  async fn insert_otp(
    &self,
    phone: &str,
    purpose: OtpPurpose,
    code_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
  ) -> Result<OtpCode> {
    let sql = format!(
      "INSERT INTO otp_codes (phone, purpose, code_hash, created_at, expires_at) VALUES ($1, $2, $3, $4, $5) \
       RETURNING {}",
      OTP_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, OtpCode>(&sql)
        .bind(phone)
        .bind(purpose)
        .bind(code_hash)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn latest_pending_otp(&self, phone: &str, purpose: OtpPurpose, now: DateTime<Utc>) -> Result<Option<OtpCode>> {
    let sql = format!(
      "SELECT {} FROM otp_codes \
       WHERE phone = $1 AND purpose = $2 AND verified_at IS NULL AND expires_at > $3 \
       ORDER BY created_at DESC LIMIT 1",
      OTP_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, OtpCode>(&sql)
        .bind(phone)
        .bind(purpose)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn consume_otp(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query("UPDATE otp_codes SET verified_at = $2 WHERE id = $1 AND verified_at IS NULL")
      .bind(id)
      .bind(at)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn record_otp_failure(&self, id: Uuid) -> Result<i32> {
    let attempts: Option<i32> =
      sqlx::query_scalar("UPDATE otp_codes SET failed_attempts = failed_attempts + 1 WHERE id = $1 RETURNING failed_attempts")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
    attempts.ok_or_else(|| AppError::NotFound(format!("Code {} not found", id)))
  }

  async fn delete_otp(&self, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM otp_codes WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn count_otps_since(&self, phone: &str, since: DateTime<Utc>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM otp_codes WHERE phone = $1 AND created_at >= $2")
      .bind(phone)
      .bind(since)
      .fetch_one(&self.pool)
      .await?;
    Ok(count)
  }

  async fn last_otp_sent_at(&self, phone: &str) -> Result<Option<DateTime<Utc>>> {
    let last: Option<DateTime<Utc>> = sqlx::query_scalar("SELECT MAX(created_at) FROM otp_codes WHERE phone = $1")
      .bind(phone)
      .fetch_one(&self.pool)
      .await?;
    Ok(last)
  }
}

#[async_trait]
impl NotificationStore for PgStore {
  async fn insert_notification(&self, new_notification: NewNotification) -> Result<Notification> {
    let sql = format!(
      "INSERT INTO notifications (recipient_id, title, body, link, kind) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
      NOTIFICATION_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Notification>(&sql)
        .bind(new_notification.recipient_id)
        .bind(new_notification.title)
        .bind(new_notification.body)
        .bind(new_notification.link)
        .bind(new_notification.kind)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn list_notifications(&self, recipient_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
    let sql = format!(
      "SELECT {} FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC LIMIT $2",
      NOTIFICATION_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Notification>(&sql)
        .bind(recipient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn mark_notification_read(&self, recipient_id: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<Option<Notification>> {
    let sql = format!(
      "UPDATE notifications SET read_at = COALESCE(read_at, $3) \
       WHERE id = $1 AND recipient_id = $2 RETURNING {}",
      NOTIFICATION_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Notification>(&sql)
        .bind(id)
        .bind(recipient_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn unread_count(&self, recipient_id: Uuid) -> Result<i64> {
    let count: i64 =
      sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read_at IS NULL")
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;
    Ok(count)
  }
}

#[async_trait]
impl AuditStore for PgStore {
  async fn insert_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
    Ok(
      sqlx::query_as::<_, AuditEntry>(
        "INSERT INTO audit_log (actor_id, action, subject_id, detail) VALUES ($1, $2, $3, $4) \
         RETURNING id, actor_id, action, subject_id, detail, created_at",
      )
      .bind(entry.actor_id)
      .bind(entry.action)
      .bind(entry.subject_id)
      .bind(entry.detail)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn list_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
    Ok(
      sqlx::query_as::<_, AuditEntry>(
        "SELECT id, actor_id, action, subject_id, detail, created_at FROM audit_log \
         ORDER BY created_at DESC LIMIT $1",
      )
      .bind(limit)
      .fetch_all(&self.pool)
      .await?,
    )
  }
}

#[async_trait]
impl ReportLockStore for PgStore {
  async fn insert_report_lock(&self, order_id: Uuid, report_date: NaiveDate, locked_by: Uuid) -> Result<ReportLock> {
    sqlx::query_as::<_, ReportLock>(
      "INSERT INTO report_locks (order_id, report_date, locked_by) VALUES ($1, $2, $3) \
       RETURNING order_id, report_date, locked_by, locked_at",
    )
    .bind(order_id)
    .bind(report_date)
    .bind(locked_by)
    .fetch_one(&self.pool)
    .await
    .map_err(|e| {
      if is_unique_violation(&e) {
        AppError::Conflict(format!("Report for {} is already locked", report_date))
      } else {
        AppError::Sqlx(e)
      }
    })
  }

  async fn delete_report_lock(&self, order_id: Uuid, report_date: NaiveDate) -> Result<bool> {
    let result = sqlx::query("DELETE FROM report_locks WHERE order_id = $1 AND report_date = $2")
      .bind(order_id)
      .bind(report_date)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn list_report_locks(&self, order_id: Uuid) -> Result<Vec<ReportLock>> {
    Ok(
      sqlx::query_as::<_, ReportLock>(
        "SELECT order_id, report_date, locked_by, locked_at FROM report_locks \
         WHERE order_id = $1 ORDER BY report_date",
      )
      .bind(order_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }
}

#[async_trait]
impl PaymentStore for PgStore {
  async fn insert_payment(&self, order_id: Uuid, authority: &str, amount: i64) -> Result<Payment> {
    Ok(
      sqlx::query_as::<_, Payment>(
        "INSERT INTO payments (order_id, authority, amount) VALUES ($1, $2, $3) \
         RETURNING id, order_id, authority, amount, status, ref_id, created_at",
      )
      .bind(order_id)
      .bind(authority)
      .bind(amount)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn find_payment_by_authority(&self, authority: &str) -> Result<Option<Payment>> {
    Ok(
      sqlx::query_as::<_, Payment>(
        "SELECT id, order_id, authority, amount, status, ref_id, created_at FROM payments WHERE authority = $1",
      )
      .bind(authority)
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  async fn update_payment(&self, id: Uuid, status: PaymentStatus, ref_id: Option<String>) -> Result<Option<Payment>> {
    Ok(
      sqlx::query_as::<_, Payment>(
        "UPDATE payments SET status = $2, ref_id = $3 WHERE id = $1 \
         RETURNING id, order_id, authority, amount, status, ref_id, created_at",
      )
      .bind(id)
      .bind(status)
      .bind(ref_id)
      .fetch_optional(&self.pool)
      .await?,
    )
  }
}

#[async_trait]
impl ModuleStore for PgStore {
  async fn create_module(&self, name: &str) -> Result<Module> {
    Ok(
      sqlx::query_as::<_, Module>("INSERT INTO modules (name) VALUES ($1) RETURNING id, name, created_at")
        .bind(name)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn find_module(&self, id: Uuid) -> Result<Option<Module>> {
    Ok(
      sqlx::query_as::<_, Module>("SELECT id, name, created_at FROM modules WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn delete_module(&self, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM modules WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn save_module_version(&self, module_id: Uuid, content: serde_json::Value, saved_by: Uuid) -> Result<ModuleVersion> {
    let sql = format!(
      "INSERT INTO module_versions (module_id, version, content, saved_by) \
       SELECT $1, COALESCE(MAX(version), 0) + 1, $2, $3 FROM module_versions WHERE module_id = $1 \
       RETURNING {}",
      MODULE_VERSION_COLUMNS
    );
    sqlx::query_as::<_, ModuleVersion>(&sql)
      .bind(module_id)
      .bind(content)
      .bind(saved_by)
      .fetch_one(&self.pool)
      .await
      .map_err(|e| {
        if is_unique_violation(&e) {
          AppError::Conflict("Module was saved concurrently, retry".into())
        } else if matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation()) {
          AppError::NotFound(format!("Module {} not found", module_id))
        } else {
          AppError::Sqlx(e)
        }
      })
  }

  async fn list_module_versions(&self, module_id: Uuid) -> Result<Vec<ModuleVersion>> {
    let sql = format!(
      "SELECT {} FROM module_versions WHERE module_id = $1 ORDER BY version DESC",
      MODULE_VERSION_COLUMNS
    );
    Ok(sqlx::query_as::<_, ModuleVersion>(&sql).bind(module_id).fetch_all(&self.pool).await?)
  }
}

#[async_trait]
impl DailyReportStore for PgStore {
  async fn save_report_version(
    &self,
    order_id: Uuid,
    report_date: NaiveDate,
    content: serde_json::Value,
    author_id: Uuid,
  ) -> Result<DailyReportVersion> {
    let sql = format!(
      "INSERT INTO daily_report_versions (order_id, report_date, version, content, author_id) \
       SELECT $1, $2, COALESCE(MAX(version), 0) + 1, $3, $4 FROM daily_report_versions \
       WHERE order_id = $1 AND report_date = $2 \
       HAVING NOT EXISTS (SELECT 1 FROM report_locks WHERE order_id = $1 AND report_date = $2) \
       RETURNING {}",
      REPORT_VERSION_COLUMNS
    );
    let saved = sqlx::query_as::<_, DailyReportVersion>(&sql)
      .bind(order_id)
      .bind(report_date)
      .bind(content)
      .bind(author_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(|e| {
        if is_unique_violation(&e) {
          AppError::Conflict("Report was saved concurrently, retry".into())
        } else {
          AppError::Sqlx(e)
        }
      })?;
    saved.ok_or_else(|| AppError::Conflict(format!("Report for {} is locked", report_date)))
  }

  async fn list_report_versions(&self, order_id: Uuid, report_date: NaiveDate) -> Result<Vec<DailyReportVersion>> {
    let sql = format!(
      "SELECT {} FROM daily_report_versions WHERE order_id = $1 AND report_date = $2 ORDER BY version DESC",
      REPORT_VERSION_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, DailyReportVersion>(&sql)
        .bind(order_id)
        .bind(report_date)
        .fetch_all(&self.pool)
        .await?,
    )
  }
}

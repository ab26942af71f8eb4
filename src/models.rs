//! Data models for the power-quality monitor.
//!
//! Row types map 1:1 onto the tables created in `schema.rs`. Request bodies
//! that create rows live next to the row they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Database-generated identifier (`BIGSERIAL`).
pub type DbId = i64;

// ---

/// Incoming measurement submitted by a meter or gateway.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPowerReading {
    // ---
    #[validate(range(min = 0.0))]
    pub voltage: f64,
    #[validate(range(min = 0.0))]
    pub current: f64,
    #[validate(range(min = 0.0))]
    pub frequency: f64,
    #[validate(range(min = -1.0, max = 1.0))]
    pub power_factor: Option<f64>,
    #[validate(custom(function = "not_blank"))]
    pub equipment_id: String,
    #[validate(custom(function = "not_blank"))]
    pub location: String,
}

/// Stored power reading.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PowerReading {
    // ---
    pub id: DbId,
    pub timestamp: DateTime<Utc>,
    pub voltage: f64,
    pub current: f64,
    pub frequency: f64,
    pub power_factor: Option<f64>,
    pub equipment_id: String,
    pub location: String,
    pub is_anomaly: bool,
}

/// Ordinal anomaly magnitude, `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "alert_severity", rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];
}

/// Alert raised for an anomalous reading.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Alert {
    // ---
    pub id: DbId,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    pub description: Option<String>,
    pub power_reading_id: DbId,
    pub is_acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Access level. Declaration order gives `Viewer < Operator < Admin`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    Operator,
    Admin,
}

impl Role {
    /// `true` when this role is at least as privileged as `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }
}

/// Account row. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    // ---
    pub id: DbId,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Registration request body.
#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    // ---
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Lifecycle state of a session at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Expired,
    Revoked,
}

/// Login session bound to a bearer token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    // ---
    pub id: DbId,
    pub user_id: DbId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Classify the session at `now`. Revocation wins over expiry.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        // ---
        if !self.is_active {
            SessionState::Revoked
        } else if self.expires_at <= now {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }
}

/// Public view of a session; the token itself is never echoed back.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    // ---
    pub id: DbId,
    pub user_id: DbId,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: SessionState,
    pub is_current: bool,
}

impl SessionInfo {
    pub fn from_session(session: Session, current_token: &str, now: DateTime<Utc>) -> Self {
        // ---
        SessionInfo {
            state: session.state_at(now),
            is_current: session.token == current_token,
            id: session.id,
            user_id: session.user_id,
            device_info: session.device_info,
            ip_address: session.ip_address,
            created_at: session.created_at,
            last_activity: session.last_activity,
            expires_at: session.expires_at,
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    fn session_at(is_active: bool, expires_at: DateTime<Utc>) -> Session {
        // ---
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        Session {
            id: 1,
            user_id: 7,
            token: "tok-1".to_string(),
            expires_at,
            device_info: Some("curl/8.5".to_string()),
            ip_address: Some("10.0.0.4".to_string()),
            is_active,
            created_at: created,
            last_activity: created,
        }
    }

    fn reading(voltage: f64, power_factor: Option<f64>, equipment_id: &str) -> NewPowerReading {
        // ---
        NewPowerReading {
            voltage,
            current: 50.0,
            frequency: 50.0,
            power_factor,
            equipment_id: equipment_id.to_string(),
            location: "Substation 4".to_string(),
        }
    }

    #[test]
    fn test_session_state_transitions() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();

        let live = session_at(true, now + Duration::days(3));
        assert_eq!(live.state_at(now), SessionState::Active);

        let lapsed = session_at(true, now - Duration::seconds(1));
        assert_eq!(lapsed.state_at(now), SessionState::Expired);

        // Expiry instant itself no longer counts as active
        let boundary = session_at(true, now);
        assert_eq!(boundary.state_at(now), SessionState::Expired);

        let revoked = session_at(false, now + Duration::days(3));
        assert_eq!(revoked.state_at(now), SessionState::Revoked);

        let revoked_and_lapsed = session_at(false, now - Duration::days(3));
        assert_eq!(revoked_and_lapsed.state_at(now), SessionState::Revoked);
    }

    #[test]
    fn test_role_hierarchy() {
        // ---
        assert!(Role::Admin.satisfies(Role::Operator));
        assert!(Role::Admin.satisfies(Role::Viewer));
        assert!(Role::Operator.satisfies(Role::Operator));
        assert!(Role::Operator.satisfies(Role::Viewer));
        assert!(!Role::Operator.satisfies(Role::Admin));
        assert!(!Role::Viewer.satisfies(Role::Operator));
        assert_eq!(Role::default(), Role::Viewer);
    }

    #[test]
    fn test_enum_wire_names() {
        // ---
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
        assert_eq!(serde_json::to_string(&Role::Operator).unwrap(), "\"operator\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert!(Severity::Low < Severity::Medium && Severity::High < Severity::Critical);
    }

    #[test]
    fn test_session_info_hides_token() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let info = SessionInfo::from_session(session_at(true, now + Duration::days(1)), "tok-1", now);
        assert!(info.is_current);
        assert_eq!(info.state, SessionState::Active);

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("token").is_none());
        assert_eq!(json["ip_address"], "10.0.0.4");
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["state"], "active");
    }

    #[test]
    fn test_reading_validation() {
        // ---
        assert!(reading(230.0, Some(0.95), "TX-01").validate().is_ok());
        assert!(reading(230.0, None, "TX-01").validate().is_ok());
        assert!(reading(-1.0, None, "TX-01").validate().is_err());
        assert!(reading(230.0, Some(1.2), "TX-01").validate().is_err());
        assert!(reading(230.0, None, "   ").validate().is_err());
    }

    #[test]
    fn test_registration_validation() {
        // ---
        let ok = NewUser {
            email: "op@grid.example".to_string(),
            username: "operator1".to_string(),
            password: "longenough".to_string(),
            role: None,
        };
        assert!(ok.validate().is_ok());

        let bad = NewUser {
            email: "not-an-email".to_string(),
            username: "op".to_string(),
            password: "short".to_string(),
            role: Some(Role::Admin),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password"));
    }
}

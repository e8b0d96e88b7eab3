use chrono::FixedOffset;
use rocket::figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::attendance::WindowPolicy;
use crate::error::AppError;
use crate::qr::QrCodec;

pub const DEVELOPMENT_QR_SECRET: &str = "attendme-development-qr-secret";
pub const MAX_SESSION_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Key for the checksum embedded in student QR tokens.
    pub qr_secret: String,
    /// Offset of the school's local time from UTC. Class times are local.
    pub utc_offset_minutes: i32,
    /// Lets teachers record Absent/Late after the window closes, same day only.
    pub allow_manual_backdate: bool,
    pub session_hours: i64,
    pub otlp_endpoint: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            qr_secret: DEVELOPMENT_QR_SECRET.to_string(),
            utc_offset_minutes: 0,
            allow_manual_backdate: true,
            session_hours: 8,
            otlp_endpoint: None,
        }
    }
}

impl AppConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Env::prefixed("ATTENDME_"))
    }

    pub fn load() -> Result<Self, rocket::figment::Error> {
        Self::figment().extract()
    }

    pub fn validate(&self, production: bool) -> Result<(), AppError> {
        if self.qr_secret.trim().len() < 16 {
            return Err(AppError::Validation(
                "qr_secret must be at least 16 characters".to_string(),
            ));
        }

        if production && self.qr_secret == DEVELOPMENT_QR_SECRET {
            return Err(AppError::Validation(
                "ATTENDME_QR_SECRET must be set in production".to_string(),
            ));
        }

        if !(1..=MAX_SESSION_HOURS).contains(&self.session_hours) {
            return Err(AppError::Validation(format!(
                "session_hours must be between 1 and {}",
                MAX_SESSION_HOURS
            )));
        }

        self.timezone()?;

        Ok(())
    }

    pub fn timezone(&self) -> Result<FixedOffset, AppError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "utc_offset_minutes {} is out of range",
                    self.utc_offset_minutes
                ))
            })
    }

    pub fn window_policy(&self) -> Result<WindowPolicy, AppError> {
        Ok(WindowPolicy {
            timezone: self.timezone()?,
            allow_manual_backdate: self.allow_manual_backdate,
        })
    }

    pub fn qr_codec(&self) -> QrCodec {
        QrCodec::new(self.qr_secret.as_bytes())
    }
}

//! Student identity tokens carried by QR codes.
//!
//! A token is `AM1-<student id>-<checksum>`, where the checksum is the first
//! twelve bytes of HMAC-SHA256 over the decimal student id, hex encoded. The
//! same student always gets the same token, and the token says nothing about
//! which class or session it is scanned for.

use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::Sha256;
use sqlx::{Pool, Sqlite};
use tracing::{instrument, warn};

use crate::db::find_student_profile;
use crate::error::AppError;
use crate::models::StudentProfile;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_PREFIX: &str = "AM1";
const CHECKSUM_BYTES: usize = 12;

static TOKEN_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^AM1-([1-9][0-9]{0,18})-([0-9a-f]{24})$").expect("static token regex")
});

#[derive(Clone)]
pub struct QrCodec {
    secret: Vec<u8>,
}

impl QrCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }

    fn mac_for(&self, student_id: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(student_id.to_string().as_bytes());
        mac
    }

    fn checksum(&self, student_id: i64) -> Vec<u8> {
        self.mac_for(student_id).finalize().into_bytes()[..CHECKSUM_BYTES].to_vec()
    }

    pub fn encode(&self, student_id: i64) -> String {
        format!(
            "{}-{}-{}",
            TOKEN_PREFIX,
            student_id,
            hex::encode(self.checksum(student_id))
        )
    }

    /// Checks the token's shape and checksum and returns the student id.
    /// Whether that student exists is left to [`resolve_scan`].
    pub fn decode(&self, payload: &str) -> Result<i64, AppError> {
        let payload = payload.trim();

        let captures = TOKEN_FORMAT
            .captures(payload)
            .ok_or_else(|| AppError::Decode("payload is not an AttendMe token".to_string()))?;

        let student_id: i64 = captures[1]
            .parse()
            .map_err(|_| AppError::Decode("student id out of range".to_string()))?;

        let provided = hex::decode(&captures[2])
            .map_err(|_| AppError::Decode("malformed checksum".to_string()))?;

        self.mac_for(student_id)
            .verify_truncated_left(&provided)
            .map_err(|_| AppError::Decode("checksum mismatch".to_string()))?;

        Ok(student_id)
    }
}

/// Turns a scanned payload into the active student it identifies.
#[instrument(skip(pool, codec, payload))]
pub async fn resolve_scan(
    pool: &Pool<Sqlite>,
    codec: &QrCodec,
    payload: &str,
) -> Result<StudentProfile, AppError> {
    let student_id = codec.decode(payload)?;

    let student = match find_student_profile(pool, student_id).await? {
        Some(student) => student,
        None => {
            warn!(student_id, "Scanned token references an unknown student");
            return Err(AppError::Decode("unknown student".to_string()));
        }
    };

    if student.archived {
        warn!(student_id, "Scanned token belongs to a deactivated student");
        return Err(AppError::Decode("student account is deactivated".to_string()));
    }

    if student.qr_token != payload.trim() {
        warn!(student_id, "Scanned token does not match the stored token");
        return Err(AppError::Decode("token has been superseded".to_string()));
    }

    Ok(student)
}

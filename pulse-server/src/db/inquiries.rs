//! Demo-request inquiries

use chrono::{DateTime, Utc};
use pulse_common::db::models::{Inquiry, InquiryStatus};
use pulse_common::{uuid_utils, Result};
use sqlx::SqlitePool;

/// Submitted demo request
#[derive(Debug, Clone)]
pub struct NewInquiry {
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: Option<String>,
    pub message: Option<String>,
}

pub async fn insert(pool: &SqlitePool, new: NewInquiry, now: DateTime<Utc>) -> Result<Inquiry> {
    let inquiry = Inquiry {
        id: uuid_utils::new_id(),
        name: new.name,
        email: new.email,
        company: new.company,
        phone: new.phone,
        message: new.message,
        status: InquiryStatus::New,
        created_at: now,
    };

    sqlx::query(
        "INSERT INTO inquiries (id, name, email, company, phone, message, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&inquiry.id)
    .bind(&inquiry.name)
    .bind(&inquiry.email)
    .bind(&inquiry.company)
    .bind(&inquiry.phone)
    .bind(&inquiry.message)
    .bind(inquiry.status)
    .bind(inquiry.created_at)
    .execute(pool)
    .await?;

    Ok(inquiry)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Inquiry>> {
    let inquiries = sqlx::query_as::<_, Inquiry>("SELECT * FROM inquiries ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(inquiries)
}

pub async fn set_status(pool: &SqlitePool, id: &str, status: InquiryStatus) -> Result<Option<Inquiry>> {
    sqlx::query("UPDATE inquiries SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;

    let inquiry = sqlx::query_as::<_, Inquiry>("SELECT * FROM inquiries WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(inquiry)
}

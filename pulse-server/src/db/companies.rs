//! Companies (tenants)

use chrono::{DateTime, Utc};
use pulse_common::db::models::{Company, CompanyPlan, CompanyStatus};
use pulse_common::{uuid_utils, Result};
use sqlx::SqlitePool;

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<Company>> {
    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(company)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Company>> {
    let companies = sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(companies)
}

pub async fn insert(
    pool: &SqlitePool,
    name: &str,
    plan: CompanyPlan,
    status: CompanyStatus,
    now: DateTime<Utc>,
) -> Result<Company> {
    let company = Company {
        id: uuid_utils::new_id(),
        name: name.trim().to_string(),
        plan,
        status,
        company_account: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO companies (id, name, plan, status, company_account, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&company.id)
    .bind(&company.name)
    .bind(company.plan)
    .bind(company.status)
    .bind(&company.company_account)
    .bind(company.created_at)
    .bind(company.updated_at)
    .execute(pool)
    .await?;

    Ok(company)
}

/// Persist name, plan and status of an existing company
pub async fn update(pool: &SqlitePool, company: &Company) -> Result<()> {
    sqlx::query("UPDATE companies SET name = ?, plan = ?, status = ?, updated_at = ? WHERE id = ?")
        .bind(&company.name)
        .bind(company.plan)
        .bind(company.status)
        .bind(company.updated_at)
        .bind(&company.id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_company_account(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE companies SET company_account = ?, updated_at = ? WHERE id = ?")
        .bind(user_id)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a company; memberships, assignments and activity cascade
pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM companies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

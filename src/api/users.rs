use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ServiceError;
use crate::model::role::Role;
use crate::model::user::User;
use crate::service::users::{self, NewUser};

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "Abel Tesfaye")]
    pub full_name: String,
    #[schema(example = "abel@school.example")]
    pub email: String,
    #[schema(example = "+251911000000")]
    pub phone: Option<String>,
    pub password: String,
    pub role: Role,
    pub branch_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    body: web::Json<CreateUserRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let body = body.into_inner();
    let id = users::create_user(
        pool.get_ref(),
        NewUser {
            full_name: body.full_name,
            email: body.email,
            phone: body.phone,
            password: body.password,
            role: body.role,
            branch_id: body.branch_id,
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "id": id,
        "message": "User registered successfully"
    })))
}

#[derive(Deserialize, IntoParams)]
pub struct UserFilter {
    pub role: Option<Role>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses((status = 200, body = Vec<User>)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<UserFilter>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, full_name, email, phone, password, role, branch_id,
               base_salary, bank_name, bank_account_number, bank_code, is_active
        FROM users
        WHERE (? IS NULL OR role = ?)
        ORDER BY full_name
        "#,
    )
    .bind(query.role)
    .bind(query.role)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(users))
}

#[derive(Deserialize, ToSchema)]
pub struct FinancialsRequest {
    #[schema(example = 8000.0)]
    pub base_salary: f64,
    #[schema(example = "CBE")]
    pub bank_name: String,
    #[schema(example = "1000123456789")]
    pub bank_account_number: String,
    #[schema(example = "946")]
    pub bank_code: String,
}

/// Sets the salary and banking details disbursement relies on.
#[utoipa::path(
    put,
    path = "/api/users/{id}/financials",
    request_body = FinancialsRequest,
    params(("id", description = "Teacher ID")),
    responses(
        (status = 200, description = "Financials updated"),
        (status = 404, description = "Teacher not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_financials(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<FinancialsRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    users::update_financials(
        pool.get_ref(),
        path.into_inner(),
        body.base_salary,
        &body.bank_name,
        &body.bank_account_number,
        &body.bank_code,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Teacher Financials Updated"
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct UserActiveRequest {
    pub active: bool,
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/active",
    request_body = UserActiveRequest,
    params(("id", description = "User ID")),
    responses(
        (status = 200, description = "Active flag updated"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn set_active(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<UserActiveRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    users::set_active(pool.get_ref(), path.into_inner(), body.active).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "User Updated"
    })))
}

/// Deletes a user; blocked while attendance or payment history exists.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id", description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Dependent records exist")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    users::delete_user(pool.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "User Deleted"
    })))
}

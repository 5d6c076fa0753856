use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, ApiResult, is_duplicate_key},
    model::role::Role,
    models::{LoginReqDto, RegisterReq, RowOutcome, TokenType, UserSql},
    utils::{
        account_cache, account_filter,
        audit::{self, AuditEntry},
    },
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

/// true  => employee number AVAILABLE
/// false => employee number TAKEN
pub async fn is_employee_number_available(employee_number: &str, pool: &MySqlPool) -> bool {
    // 1️⃣ Cuckoo filter: a miss is definitive
    if !account_filter::might_exist(employee_number) {
        return true;
    }

    // 2️⃣ Moka cache: fast positive
    if account_cache::is_taken(employee_number).await {
        return false;
    }

    // 3️⃣ Database fallback
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE employee_number = ? LIMIT 1)",
    )
    .bind(employee_number.trim())
    .fetch_one(pool)
    .await
    .unwrap_or(true); // fail-safe

    if exists {
        account_cache::mark_taken(employee_number).await;
    }
    !exists
}

fn validate_registration(req: &RegisterReq) -> Result<Role, String> {
    if req.employee_number.trim().is_empty()
        || req.first_name.trim().is_empty()
        || req.last_name.trim().is_empty()
        || req.email.trim().is_empty()
        || req.password.is_empty()
    {
        return Err(
            "employee_number, first_name, last_name, email and password are required".into(),
        );
    }

    match req.role.as_deref() {
        None => Ok(Role::Staff),
        Some(r) => Role::from_str(r).map_err(|_| format!("Unknown role: {r}")),
    }
}

/// Creates the login and the person record together.
async fn insert_account(req: &RegisterReq, role: Role, pool: &MySqlPool) -> ApiResult<u64> {
    let employee_number = req.employee_number.trim();

    if !is_employee_number_available(employee_number, pool).await {
        return Err(ApiError::conflict("Employee number already registered"));
    }

    let hashed = hash_password(&req.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?;

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"INSERT INTO users (employee_number, email, password, role) VALUES (?, ?, ?, ?)"#,
    )
    .bind(employee_number)
    .bind(req.email.trim())
    .bind(&hashed)
    .bind(role.as_ref())
    .execute(&mut *tx)
    .await;

    let user_id = match inserted {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Employee number already registered"));
        }
        Err(e) => return Err(e.into()),
    };

    let person = sqlx::query(
        r#"
        INSERT INTO person_table (employee_number, first_name, middle_name, last_name, email)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_number)
    .bind(req.first_name.trim())
    .bind(req.middle_name.as_deref().map(str::trim))
    .bind(req.last_name.trim())
    .bind(req.email.trim())
    .execute(&mut *tx)
    .await;

    if let Err(e) = person {
        if is_duplicate_key(&e) {
            return Err(ApiError::conflict("Personal record already exists"));
        }
        return Err(e.into());
    }

    tx.commit().await?;

    account_filter::insert(employee_number);
    account_cache::mark_taken(employee_number).await;

    Ok(user_id)
}

/// Register a single user (administrators only)
#[utoipa::path(
    post,
    path = "/api/users/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully", "user_id": 12
        })),
        (status = 400, description = "Missing fields or unknown role"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Employee number already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn register(
    auth: AuthUser,
    req: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let role = validate_registration(&req).map_err(ApiError::BadRequest)?;
    let user_id = insert_account(&req, role, pool.get_ref()).await?;

    info!(employee_number = %req.employee_number, %role, "User registered");
    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "create", "users")
            .record(user_id)
            .target(req.employee_number.trim()),
    );

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user_id": user_id
    })))
}

#[derive(Serialize, ToSchema)]
pub struct BulkRegisterResponse {
    pub created: usize,
    pub failed: usize,
    pub results: Vec<RowOutcome>,
}

/// Register many users; rows succeed or fail independently
#[utoipa::path(
    post,
    path = "/api/users/bulk-register",
    request_body = Vec<RegisterReq>,
    responses(
        (status = 200, description = "Per-row outcomes", body = BulkRegisterResponse),
        (status = 400, description = "Empty batch"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn bulk_register(
    auth: AuthUser,
    rows: web::Json<Vec<RegisterReq>>,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if rows.is_empty() {
        return Err(ApiError::bad_request("No users provided"));
    }

    let mut results = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        let key = row.employee_number.trim().to_string();

        let role = match validate_registration(row) {
            Ok(role) => role,
            Err(msg) => {
                results.push(RowOutcome::failed(key, msg));
                continue;
            }
        };

        match insert_account(row, role, pool.get_ref()).await {
            Ok(user_id) => {
                audit::log(
                    pool.get_ref(),
                    AuditEntry::new(&auth, "create", "users")
                        .record(user_id)
                        .target(key.clone()),
                );
                results.push(RowOutcome::ok(key, "created"));
            }
            Err(ApiError::Database(e)) => {
                error!(error = %e, employee_number = %key, "Bulk registration row failed");
                results.push(RowOutcome::failed(key, "Database error"));
            }
            Err(e) => results.push(RowOutcome::failed(key, e.to_string())),
        }
    }

    let failed = results.iter().filter(|r| r.is_error()).count();
    info!(total = results.len(), failed, "Bulk registration finished");

    Ok(HttpResponse::Ok().json(BulkRegisterResponse {
        created: results.len() - failed,
        failed,
        results,
    }))
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
    #[schema(example = "staff")]
    role: String,
}

async fn store_refresh_token(
    pool: &MySqlPool,
    user_id: u64,
    jti: &str,
    exp: usize,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(jti)
    .bind(exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Login with employee number and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = LoginResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(employee_number = %user.employee_number)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.employee_number.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty employee number or password");
        return HttpResponse::BadRequest().json(json!({
            "message": "Employee number and password required"
        }));
    }

    // 2️⃣ Fetch user
    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, employee_number, password, role
        FROM users
        WHERE employee_number = ?
        "#,
    )
    .bind(user.employee_number.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"}));
    }

    // 4️⃣ Issue tokens
    let access_token = match generate_access_token(
        db_user.id,
        &db_user.employee_number,
        &db_user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    ) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to sign access token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let (refresh_token, refresh_claims) = match generate_refresh_token(
        db_user.id,
        &db_user.employee_number,
        &db_user.role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    ) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "Failed to sign refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // 5️⃣ Store refresh token
    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");
    if let Err(e) =
        store_refresh_token(pool.get_ref(), db_user.id, &refresh_claims.jti, refresh_claims.exp)
            .await
    {
        error!(error = %e, "Failed to store refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    // 6️⃣ Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    account_cache::mark_taken(&db_user.employee_number).await;
    info!("Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
        role: db_user.role,
    })
}

/// Identity carried by the caller's access token
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = AuthUser),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(auth)
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair"),
        (status = 401, description = "Missing, revoked or non-refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let token = bearer(&req).ok_or_else(|| ApiError::Unauthorized("No token".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required".into()));
    }

    let mut tx = pool.begin().await?;

    // 🔍 find refresh token in DB
    let record = sqlx::query_as::<_, (u64, u64, bool)>(
        r#"
        SELECT id, user_id, revoked
        FROM refresh_tokens
        WHERE jti = ?
        FOR UPDATE
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let (record_id, user_id) = match record {
        Some((id, user_id, false)) => (id, user_id),
        _ => return Err(ApiError::Unauthorized("Refresh token revoked or unknown".into())),
    };

    // 🔥 revoke old refresh token
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

    // 🔄 issue new pair
    let (new_refresh_token, new_claims) = generate_refresh_token(
        claims.user_id,
        &claims.sub,
        &claims.role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&new_claims.jti)
    .bind(new_claims.exp as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let access_token = generate_access_token(
        claims.user_id,
        &claims.sub,
        &claims.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "access_token": access_token,
        "refresh_token": new_refresh_token
    })))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(role: Option<&str>) -> RegisterReq {
        RegisterReq {
            employee_number: "2024-0099".into(),
            first_name: "Ana".into(),
            middle_name: None,
            last_name: "Reyes".into(),
            email: "ana@agency.gov.ph".into(),
            password: "pw".into(),
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn role_defaults_to_staff() {
        assert_eq!(validate_registration(&req(None)), Ok(Role::Staff));
        assert_eq!(
            validate_registration(&req(Some("Administrator"))),
            Ok(Role::Administrator)
        );
    }

    #[test]
    fn unknown_role_and_blank_fields_fail() {
        assert!(validate_registration(&req(Some("boss"))).is_err());

        let mut blank = req(None);
        blank.last_name = "   ".into();
        assert!(validate_registration(&blank).is_err());
    }
}

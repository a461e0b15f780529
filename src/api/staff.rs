/// Staff directory endpoints
use crate::{
    api::{created, respond, respond_with, ApiResult, Envelope},
    auth::AdminAuthContext,
    context::AppContext,
    db::staff::StaffMember,
    error::AppResult,
    staff::{CreateStaffRequest, StaffPage, StaffQuery, UpdateStaffRequest, DEPARTMENTS},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

/// Build staff routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/staff", get(list_staff).post(create_staff))
        .route("/api/staff/departments", get(departments))
        .route(
            "/api/staff/:id",
            get(get_staff).put(update_staff).delete(delete_staff),
        )
}

async fn list_staff(
    State(ctx): State<AppContext>,
    Query(query): Query<StaffQuery>,
) -> ApiResult<StaffPage> {
    respond(ctx.staff_directory.list(&query).await?)
}

async fn departments() -> ApiResult<Vec<&'static str>> {
    respond(DEPARTMENTS.to_vec())
}

async fn get_staff(State(ctx): State<AppContext>, Path(id): Path<String>) -> ApiResult<StaffMember> {
    respond(ctx.staff_directory.get(&id).await?)
}

async fn create_staff(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Json(req): Json<CreateStaffRequest>,
) -> AppResult<(StatusCode, Json<Envelope<StaffMember>>)> {
    let member = ctx.staff_directory.create(req).await?;
    created("Staff member created successfully", member)
}

async fn update_staff(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateStaffRequest>,
) -> ApiResult<StaffMember> {
    let member = ctx.staff_directory.update(&id, req).await?;
    respond_with("Staff member updated successfully", member)
}

async fn delete_staff(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Path(id): Path<String>,
) -> ApiResult<()> {
    ctx.staff_directory.delete(&id).await?;
    respond_with("Staff member deleted successfully", ())
}

#[cfg(test)]
mod tests {
    use crate::{
        api::test_support::{call, session_for},
        context::AppContext,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    fn new_member() -> serde_json::Value {
        json!({
            "name": "Dr. Alan Turing",
            "email": "turing@example.edu",
            "department": "Computer Science",
            "courses": ["Computability"],
            "qualification": "PhD",
            "office": "Room 12",
            "counsellingHours": "Mon 10-12"
        })
    }

    #[tokio::test]
    async fn test_staff_crud_requires_admin() {
        let (ctx, _rx) = AppContext::for_tests().await;
        let (_, student) = session_for(&ctx, "stu", "student").await;
        let (_, admin) = session_for(&ctx, "adm", "admin").await;

        let (status, _) = call(&ctx, "POST", "/api/staff", Some(&student), Some(new_member())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&ctx, "POST", "/api/staff", Some(&admin), Some(new_member())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(&ctx, "POST", "/api/staff", Some(&admin), Some(new_member())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &ctx,
            "PUT",
            &format!("/api/staff/{}", id),
            Some(&admin),
            Some(json!({ "office": "Room 14" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["office"], "Room 14");

        let (_, body) = call(&ctx, "GET", "/api/staff?search=comput", None, None).await;
        assert_eq!(body["data"]["pagination"]["totalStaff"], 1);

        let (status, _) = call(&ctx, "DELETE", &format!("/api/staff/{}", id), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&ctx, "GET", &format!("/api/staff/{}", id), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_departments_list() {
        let (ctx, _rx) = AppContext::for_tests().await;
        let (status, body) = call(&ctx, "GET", "/api/staff/departments", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 10);
    }
}

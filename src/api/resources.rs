/// Resource sharing and moderation endpoints
use crate::{
    api::{created, respond, respond_with, ApiResult, Envelope},
    auth::{AdminAuthContext, AuthContext},
    context::AppContext,
    db::resource::{Resource, ResourceStatus},
    error::AppResult,
    resource::{
        AdminListing, MyResources, RejectRequest, ResourceFilter, SubmitResourceRequest,
        YearListing, ALL_FILTER,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build resource routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/resources", get(list_approved))
        .route("/api/resources/counts", get(counts))
        .route("/api/resources/upload", post(upload))
        .route("/api/resources/my-posts", get(my_posts))
        .route("/api/resources/pending", get(pending))
        .route("/api/resources/admin/all", get(admin_all))
        .route("/api/resources/:id", delete(remove))
        .route("/api/resources/:id/download", put(download))
        .route("/api/resources/:id/view", put(view))
        .route("/api/resources/:id/approve", put(approve))
        .route("/api/resources/:id/reject", put(reject))
}

async fn list_approved(
    State(ctx): State<AppContext>,
    Query(filter): Query<ResourceFilter>,
) -> ApiResult<YearListing> {
    respond(ctx.resource_manager.list_approved(&filter).await?)
}

#[derive(Debug, Deserialize)]
struct CountsQuery {
    #[serde(default)]
    department: String,
    #[serde(default)]
    semester: String,
}

#[derive(Debug, Serialize)]
struct TypeCounts {
    counts: BTreeMap<String, i64>,
}

async fn counts(
    State(ctx): State<AppContext>,
    Query(query): Query<CountsQuery>,
) -> ApiResult<TypeCounts> {
    let counts = ctx
        .resource_manager
        .counts_by_type(&query.department, &query.semester)
        .await?;
    respond(TypeCounts { counts })
}

async fn upload(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<SubmitResourceRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Resource>>)> {
    let resource = ctx.resource_manager.submit(&auth.account, req).await?;

    let message = if resource.status == ResourceStatus::Approved {
        "Resource published successfully"
    } else {
        "Resource uploaded successfully and is pending admin approval"
    };
    created(message, resource)
}

async fn my_posts(State(ctx): State<AppContext>, auth: AuthContext) -> ApiResult<MyResources> {
    respond(ctx.resource_manager.list_mine(&auth.account.id).await?)
}

#[derive(Debug, Serialize)]
struct PendingList {
    count: usize,
    resources: Vec<Resource>,
}

async fn pending(State(ctx): State<AppContext>, _admin: AdminAuthContext) -> ApiResult<PendingList> {
    let resources = ctx.resource_manager.list_pending().await?;
    respond(PendingList {
        count: resources.len(),
        resources,
    })
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

async fn admin_all(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Query(query): Query<StatusQuery>,
) -> ApiResult<AdminListing> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) if s.eq_ignore_ascii_case(ALL_FILTER) => None,
        Some(s) => Some(ResourceStatus::parse(s)?),
    };
    respond(ctx.resource_manager.list_all(status).await?)
}

async fn remove(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<()> {
    ctx.resource_manager.delete(&id, &auth.account).await?;
    respond_with("Resource deleted successfully", ())
}

async fn download(State(ctx): State<AppContext>, Path(id): Path<String>) -> ApiResult<()> {
    ctx.resource_manager.increment_download(&id).await?;
    respond(())
}

async fn view(State(ctx): State<AppContext>, Path(id): Path<String>) -> ApiResult<()> {
    ctx.resource_manager.increment_view(&id).await?;
    respond(())
}

async fn approve(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(id): Path<String>,
) -> ApiResult<Resource> {
    let resource = ctx.resource_manager.approve(&id, &admin.account).await?;
    respond_with("Resource approved successfully", resource)
}

async fn reject(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Resource> {
    let resource = ctx
        .resource_manager
        .reject(&id, &admin.account, &req.reason)
        .await?;
    respond_with("Resource rejected", resource)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::test_support::{call, session_for},
        context::AppContext,
    };
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn submission() -> Value {
        json!({
            "courseName": "Operating Systems",
            "title": "Scheduling notes",
            "description": "Round robin and friends",
            "resourceType": "Notes",
            "department": "Computer Science",
            "semester": "5",
            "section": "B",
            "batch": "2022",
            "year": 2024,
            "fileName": "sched.pdf",
            "fileUrl": "http://localhost/files/sched.pdf",
            "fileSize": "800 KB",
            "fileType": "application/pdf"
        })
    }

    #[tokio::test]
    async fn test_upload_review_and_listing() {
        let (ctx, _rx) = AppContext::for_tests().await;
        let (_, student) = session_for(&ctx, "stu", "student").await;
        let (_, admin) = session_for(&ctx, "adm", "admin").await;

        let (status, body) = call(
            &ctx,
            "POST",
            "/api/resources/upload",
            Some(&student),
            Some(submission()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "pending");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        // Not yet public
        let (_, body) = call(&ctx, "GET", "/api/resources", None, None).await;
        assert_eq!(body["data"]["count"], 0);

        let (status, _) = call(
            &ctx,
            "PUT",
            &format!("/api/resources/{}/approve", id),
            Some(&student),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &ctx,
            "PUT",
            &format!("/api/resources/{}/approve", id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "approved");

        let (status, body) = call(
            &ctx,
            "PUT",
            &format!("/api/resources/{}/approve", id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "InvalidState");

        let (_, body) = call(&ctx, "GET", "/api/resources?department=Computer%20Science", None, None).await;
        assert_eq!(body["data"]["count"], 1);
        assert_eq!(body["data"]["resources"]["2024"][0]["title"], "Scheduling notes");

        let (_, body) = call(
            &ctx,
            "GET",
            "/api/resources/counts?department=Computer%20Science&semester=5",
            None,
            None,
        )
        .await;
        assert_eq!(body["data"]["counts"]["Notes"], 1);
    }

    #[tokio::test]
    async fn test_reject_requires_reason() {
        let (ctx, _rx) = AppContext::for_tests().await;
        let (_, student) = session_for(&ctx, "stu", "student").await;
        let (_, admin) = session_for(&ctx, "adm", "admin").await;

        let (_, body) = call(
            &ctx,
            "POST",
            "/api/resources/upload",
            Some(&student),
            Some(submission()),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &ctx,
            "PUT",
            &format!("/api/resources/{}/reject", id),
            Some(&admin),
            Some(json!({ "reason": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "ValidationError");

        let (_, body) = call(
            &ctx,
            "GET",
            "/api/resources/admin/all?status=pending",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(body["data"]["stats"]["pending"], 1);
    }

    #[tokio::test]
    async fn test_view_counter_on_missing_resource() {
        let (ctx, _rx) = AppContext::for_tests().await;
        let (status, body) = call(&ctx, "PUT", "/api/resources/missing/view", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }
}

/// Staff directory storage
use crate::{
    db::{
        conflict_on_unique,
        staff::{encode_list, StaffMember, STAFF_COLUMNS},
    },
    error::{AppError, AppResult},
    staff::{
        validate_department, CreateStaffRequest, Pagination, StaffPage, StaffQuery, StaffSort,
        UpdateStaffRequest, DEFAULT_PAGE_SIZE, DEFAULT_STAFF_IMAGE, MAX_PAGE_SIZE,
    },
    storage::ObjectStorage,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteArguments, Arguments, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const DUPLICATE_EMAIL: &str = "A staff member with this email already exists";

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct StaffDirectory {
    db: SqlitePool,
    storage: Arc<dyn ObjectStorage>,
}

impl StaffDirectory {
    pub fn new(db: SqlitePool, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { db, storage }
    }

    pub async fn get(&self, id: &str) -> AppResult<StaffMember> {
        let row = sqlx::query(&format!("SELECT {} FROM staff WHERE id = ?1", STAFF_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Staff member not found".to_string()))?;

        StaffMember::from_row(&row)
    }

    /// Paginated listing with optional search and department filter
    pub async fn list(&self, query: &StaffQuery) -> AppResult<StaffPage> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let sort = StaffSort::parse(query.sort_by.as_deref().unwrap_or("name"));

        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|search| {
                let escaped = search
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                format!("%{}%", escaped)
            });
        let department = query
            .department
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mut conditions = Vec::new();
        let mut values = Vec::new();
        if let Some(pattern) = search {
            values.push(pattern);
            conditions.push(
                "(name LIKE ?1 ESCAPE '\\' OR department LIKE ?1 ESCAPE '\\' \
                 OR courses LIKE ?1 ESCAPE '\\' OR qualification LIKE ?1 ESCAPE '\\')"
                    .to_string(),
            );
        }
        if let Some(department) = department {
            values.push(department);
            conditions.push(format!("department = ?{}", values.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS total FROM staff {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for value in &values {
            count_query = count_query.bind(value);
        }
        let total: i64 = count_query.fetch_one(&self.db).await?.get("total");

        let list_sql = format!(
            "SELECT {} FROM staff {} ORDER BY {} LIMIT {} OFFSET {}",
            STAFF_COLUMNS,
            where_clause,
            sort.order_by(),
            limit,
            (page - 1) * limit
        );
        let mut list_query = sqlx::query(&list_sql);
        for value in &values {
            list_query = list_query.bind(value);
        }
        let rows = list_query.fetch_all(&self.db).await?;

        let staff = rows
            .iter()
            .map(StaffMember::from_row)
            .collect::<AppResult<Vec<_>>>()?;

        let pagination = Pagination::new(page, limit, staff.len() as i64, total);
        Ok(StaffPage { staff, pagination })
    }

    pub async fn create(&self, request: CreateStaffRequest) -> AppResult<StaffMember> {
        request.validate()?;
        validate_department(&request.department)?;

        let now = Utc::now();
        let image = request
            .image
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STAFF_IMAGE);

        let row = sqlx::query(&format!(
            "INSERT INTO staff (id, name, email, department, image, courses, qualification, office,
                                counselling_hours, phone_number, bio, specialization,
                                years_of_experience, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
             RETURNING {}",
            STAFF_COLUMNS
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(request.name.trim())
        .bind(request.email.trim().to_lowercase())
        .bind(&request.department)
        .bind(image)
        .bind(encode_list(&clean_list(&request.courses)))
        .bind(request.qualification.trim())
        .bind(request.office.trim())
        .bind(request.counselling_hours.trim())
        .bind(request.phone_number.as_deref().map(str::trim))
        .bind(&request.bio)
        .bind(encode_list(&clean_list(&request.specialization)))
        .bind(request.years_of_experience)
        .bind(request.is_active.unwrap_or(true))
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_EMAIL))?;

        let member = StaffMember::from_row(&row)?;
        tracing::info!(staff_id = %member.id, department = %member.department, "Staff member created");
        Ok(member)
    }

    /// Apply the fields present in `request`
    pub async fn update(&self, id: &str, request: UpdateStaffRequest) -> AppResult<StaffMember> {
        request.validate()?;
        if let Some(department) = &request.department {
            validate_department(department)?;
        }

        let mut sets = Vec::new();
        let mut args = SqliteArguments::default();

        macro_rules! set {
            ($column:literal, $value:expr) => {
                args.add($value)
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                sets.push(format!("{} = ?{}", $column, sets.len() + 1));
            };
        }

        if let Some(name) = &request.name {
            set!("name", name.trim().to_string());
        }
        if let Some(email) = &request.email {
            set!("email", email.trim().to_lowercase());
        }
        if let Some(department) = request.department {
            set!("department", department);
        }
        if let Some(image) = request.image {
            set!("image", image);
        }
        if let Some(courses) = &request.courses {
            set!("courses", encode_list(&clean_list(courses)));
        }
        if let Some(qualification) = request.qualification {
            set!("qualification", qualification);
        }
        if let Some(office) = request.office {
            set!("office", office);
        }
        if let Some(hours) = request.counselling_hours {
            set!("counselling_hours", hours);
        }
        if let Some(phone) = request.phone_number {
            set!("phone_number", phone.trim().to_string());
        }
        if let Some(bio) = request.bio {
            set!("bio", bio);
        }
        if let Some(specialization) = &request.specialization {
            set!("specialization", encode_list(&clean_list(specialization)));
        }
        if let Some(years) = request.years_of_experience {
            set!("years_of_experience", years);
        }
        if let Some(active) = request.is_active {
            set!("is_active", active);
        }
        set!("updated_at", Utc::now());

        args.add(id.to_string())
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let sql = format!(
            "UPDATE staff SET {} WHERE id = ?{} RETURNING {}",
            sets.join(", "),
            sets.len() + 1,
            STAFF_COLUMNS
        );

        let row = sqlx::query_with(&sql, args)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, DUPLICATE_EMAIL))?
            .ok_or_else(|| AppError::NotFound("Staff member not found".to_string()))?;

        StaffMember::from_row(&row)
    }

    /// Hard delete. The profile image is released when it lives in our storage.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let member = self.get(id).await?;

        if let Some(path) = self.storage.path_for_url(&member.image) {
            if let Err(e) = self.storage.delete(&path).await {
                tracing::warn!(staff_id = %id, error = %e, "Failed to delete staff image");
            }
        }

        sqlx::query("DELETE FROM staff WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(staff_id = %id, "Staff member deleted");
        Ok(())
    }
}

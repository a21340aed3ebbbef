use serde::Serialize;

/// Pagination metadata for list endpoints.
#[derive(Serialize, utoipa::ToSchema)]
pub struct Pagination {
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 20)]
    pub per_page: u64,
    #[schema(example = 57)]
    pub total: u64,
    #[schema(example = 3)]
    pub total_pages: u64,
}

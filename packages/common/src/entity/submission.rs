use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::SubmissionStatus;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub language: String,
    #[sea_orm(column_type = "Text")]
    pub code: String,
    pub status: SubmissionStatus,

    /// Serialized per-case results (JSON array of `CaseResult`), or the
    /// failure text for runs that never produced case results.
    #[sea_orm(column_type = "Text", nullable)]
    pub output: Option<String>,
    /// Total execution time across all cases, in seconds.
    pub time: Option<f64>,
    /// Peak memory across all cases, in MiB.
    pub memory: Option<f64>,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub problem_id: i32,
    #[sea_orm(belongs_to, from = "problem_id", to = "id")]
    pub problem: HasOne<super::problem::Entity>,

    #[sea_orm(has_many)]
    pub test_case_results: HasMany<super::test_case_result::Entity>,

    pub created_at: DateTimeUtc,
    pub judged_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::CaseStatus;

/// One outcome per (submission, test case) pair. Insert-only: a row is never
/// mutated after creation.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "test_case_result")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "submission_test_case")]
    pub submission_id: i32,
    #[sea_orm(unique_key = "submission_test_case")]
    pub test_case_id: i32,

    pub status: CaseStatus,

    /// Canonical form of the produced value, when the run completed.
    #[sea_orm(column_type = "Text", nullable)]
    pub output: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub expected_output: String,
    /// Seconds; None when unavailable (time limit exceeded, harness fault).
    pub execution_time: Option<f64>,
    /// MiB; None when unavailable.
    pub peak_memory: Option<f64>,
    /// Failure detail for runtime errors and harness faults.
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    #[sea_orm(belongs_to, from = "submission_id", to = "id")]
    pub submission: HasOne<super::submission::Entity>,
    #[sea_orm(belongs_to, from = "test_case_id", to = "id")]
    pub test_case: HasOne<super::test_case::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    /// Opaque hash, managed by the external auth layer.
    pub password: String,

    /// Distinct problems with at least one accepted solution.
    /// Recomputed from submission history after every evaluation.
    pub solved_count: i32,
    /// Accepted submissions over total submissions, in percent.
    pub success_rate: f64,
    /// Consecutive days with an accepted solution.
    pub streak: i32,
    /// Day of the most recent accepted solution; drives the streak.
    pub last_active_date: Option<Date>,
    pub experience: i32,
    /// Tier name derived from cumulative experience.
    pub level: String,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::submission::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

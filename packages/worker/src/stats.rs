use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QuerySelect, Set,
};
use tracing::debug;

use common::entity::{submission, user};
use common::{Difficulty, SubmissionStatus};

/// Experience bonus thresholds for an accepted solution.
const FAST_SOLUTION_SECS: f64 = 1.0;
const LEAN_SOLUTION_MB: f64 = 10.0;

/// Points for one accepted solution: the difficulty tier base plus bonuses
/// for fast (< 1 s total) and lean (< 10 MiB peak) runs.
pub fn experience_award(difficulty: Difficulty, total_time: f64, peak_memory: f64) -> i32 {
    let mut points = difficulty.experience_points();
    if total_time < FAST_SOLUTION_SECS {
        points += 5;
    }
    if peak_memory < LEAN_SOLUTION_MB {
        points += 5;
    }
    points
}

/// Tier name for a cumulative experience total.
pub fn level_for(experience: i32) -> &'static str {
    if experience < 100 {
        "Beginner"
    } else if experience < 250 {
        "Intermediate"
    } else if experience < 500 {
        "Advanced"
    } else {
        "Expert"
    }
}

/// Next streak value given the day of the last accepted solution:
/// unchanged if already recorded today, +1 if the last activity was exactly
/// yesterday, otherwise back to 1.
pub fn next_streak(current: i32, last_active: Option<NaiveDate>, today: NaiveDate) -> i32 {
    match last_active {
        Some(day) if day == today => current,
        Some(day) if today - day == chrono::Duration::days(1) => current + 1,
        _ => 1,
    }
}

/// Recompute the user's aggregate counters from the full submission history.
/// Never incremented in place: recomputation tolerates concurrent
/// evaluations for the same user without lost updates.
pub async fn refresh_user_stats(db: &DatabaseConnection, user_id: i32) -> Result<(), DbErr> {
    let total = submission::Entity::find()
        .filter(submission::Column::UserId.eq(user_id))
        .count(db)
        .await?;

    let accepted = submission::Entity::find()
        .filter(submission::Column::UserId.eq(user_id))
        .filter(submission::Column::Status.eq(SubmissionStatus::Accepted))
        .count(db)
        .await?;

    let solved = submission::Entity::find()
        .filter(submission::Column::UserId.eq(user_id))
        .filter(submission::Column::Status.eq(SubmissionStatus::Accepted))
        .select_only()
        .column(submission::Column::ProblemId)
        .distinct()
        .count(db)
        .await?;

    let success_rate = if total == 0 {
        0.0
    } else {
        accepted as f64 / total as f64 * 100.0
    };

    let update = user::ActiveModel {
        id: Set(user_id),
        solved_count: Set(solved as i32),
        success_rate: Set(success_rate),
        ..Default::default()
    };
    update.update(db).await?;

    debug!(user_id, total, accepted, solved, "User stats refreshed");
    Ok(())
}

/// Apply the acceptance side effects: experience by difficulty (with time and
/// memory bonuses), level from the new cumulative total, and the daily
/// streak. Returns the points gained.
pub async fn apply_acceptance_rewards(
    db: &DatabaseConnection,
    user: &user::Model,
    difficulty: Difficulty,
    total_time: f64,
    peak_memory: f64,
    today: NaiveDate,
) -> Result<i32, DbErr> {
    let gained = experience_award(difficulty, total_time, peak_memory);
    let experience = user.experience + gained;
    let streak = next_streak(user.streak, user.last_active_date, today);

    let update = user::ActiveModel {
        id: Set(user.id),
        experience: Set(experience),
        level: Set(level_for(experience).to_string()),
        streak: Set(streak),
        last_active_date: Set(Some(today)),
        ..Default::default()
    };
    update.update(db).await?;

    Ok(gained)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_experience_by_tier() {
        // Slow and heavy: base points only.
        assert_eq!(experience_award(Difficulty::Easy, 1.5, 20.0), 10);
        assert_eq!(experience_award(Difficulty::Medium, 1.5, 20.0), 20);
        assert_eq!(experience_award(Difficulty::Hard, 1.5, 20.0), 30);
    }

    #[test]
    fn test_experience_bonuses() {
        // Fast run: +5. Lean run: +5. Both: +10.
        assert_eq!(experience_award(Difficulty::Easy, 0.5, 20.0), 15);
        assert_eq!(experience_award(Difficulty::Easy, 1.5, 5.0), 15);
        assert_eq!(experience_award(Difficulty::Hard, 0.5, 5.0), 40);
    }

    #[test]
    fn test_bonus_boundaries_are_strict() {
        assert_eq!(experience_award(Difficulty::Easy, 1.0, 10.0), 10);
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(level_for(0), "Beginner");
        assert_eq!(level_for(99), "Beginner");
        assert_eq!(level_for(100), "Intermediate");
        assert_eq!(level_for(249), "Intermediate");
        assert_eq!(level_for(250), "Advanced");
        assert_eq!(level_for(499), "Advanced");
        assert_eq!(level_for(500), "Expert");
    }

    #[test]
    fn test_streak_increments_after_yesterday() {
        let today = date(2025, 3, 10);
        assert_eq!(next_streak(4, Some(date(2025, 3, 9)), today), 5);
    }

    #[test]
    fn test_streak_unchanged_same_day() {
        let today = date(2025, 3, 10);
        assert_eq!(next_streak(4, Some(today), today), 4);
    }

    #[test]
    fn test_streak_resets_after_gap() {
        let today = date(2025, 3, 10);
        assert_eq!(next_streak(4, Some(date(2025, 3, 7)), today), 1);
        assert_eq!(next_streak(4, None, today), 1);
    }
}

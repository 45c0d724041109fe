use crate::seed::Seeder;
use chrono::{Duration, Utc};
use db::models::attendance_record::RecordStatus;
use db::models::attendance_session::SessionKind;
use db::models::{group, group_member};
use sea_orm::{DatabaseConnection, EntityTrait};
use services::record_ledger::{self, BulkEntry};
use services::{Actor, AppError, session_manager};
use util::{state::AppState, ws::WebSocketManager};

const PAST_SESSIONS: i64 = 6;

/// Replays a few weeks of manual sessions per group so history and rollups
/// have something to show.
pub struct AttendanceSeeder;

#[async_trait::async_trait]
impl Seeder for AttendanceSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), AppError> {
        let state = AppState::new(db.clone(), WebSocketManager::new());

        for g in group::Entity::find().all(db).await? {
            if session_manager::active_for_group(db, g.id).await?.is_some() {
                continue;
            }
            let owner = Actor::resolve(db, g.id, g.owner_id).await?;
            let students = group_member::Model::students_in_group(db, g.id).await?;

            for week in (1..=PAST_SESSIONS).rev() {
                let at = Utc::now() - Duration::weeks(week);
                let session =
                    session_manager::open(db, &owner, g.id, SessionKind::Manual, at).await?;

                // leave some students unmarked for the close to fill in
                let entries: Vec<BulkEntry> = students
                    .iter()
                    .filter(|_| fastrand::u8(..10) < 8)
                    .map(|s| BulkEntry {
                        student_id: s.id,
                        status: if fastrand::u8(..10) < 7 {
                            RecordStatus::Present
                        } else {
                            RecordStatus::Absent
                        },
                    })
                    .collect();
                if !entries.is_empty() {
                    record_ledger::bulk_submit(&state, &owner, session.id, &entries, at).await?;
                }

                session_manager::close(&state, &owner, session.id, at + Duration::hours(1)).await?;
            }
        }
        Ok(())
    }
}

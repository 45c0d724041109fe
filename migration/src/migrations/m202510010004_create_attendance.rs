use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202510010004_create_attendance"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // attendance_sessions
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_sessions"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("group_id")).big_integer().not_null())
                    .col(ColumnDef::new(Alias::new("opened_by")).big_integer().not_null())
                    .col(ColumnDef::new(Alias::new("date")).date().not_null())
                    // "manual" | "self_marked"
                    .col(ColumnDef::new(Alias::new("kind")).string_len(16).not_null())
                    // "active" | "completed"
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Alias::new("opened_at")).timestamp().not_null())
                    .col(ColumnDef::new(Alias::new("expires_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("closed_at")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_sess_group")
                            .from(Alias::new("attendance_sessions"), Alias::new("group_id"))
                            .to(Alias::new("groups"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_sess_opener")
                            .from(Alias::new("attendance_sessions"), Alias::new("opened_by"))
                            .to(Alias::new("group_members"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One active session per group. Partial indexes are not expressible through
        // the schema builder, so this one is raw SQL (valid for SQLite and Postgres).
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_sessions_one_active \
                 ON attendance_sessions (group_id) WHERE status = 'active'",
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_sessions_group_opened")
                    .table(Alias::new("attendance_sessions"))
                    .col(Alias::new("group_id"))
                    .col(Alias::new("opened_at"))
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // attendance_records
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_records"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("session_id")).big_integer().not_null())
                    .col(ColumnDef::new(Alias::new("student_id")).big_integer().not_null())
                    // "present" | "absent" | "penalty"
                    .col(ColumnDef::new(Alias::new("status")).string_len(16).not_null())
                    .col(ColumnDef::new(Alias::new("marked_by")).big_integer().not_null())
                    .col(ColumnDef::new(Alias::new("marked_at")).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_rec_session")
                            .from(Alias::new("attendance_records"), Alias::new("session_id"))
                            .to(Alias::new("attendance_sessions"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_att_rec_student")
                            .from(Alias::new("attendance_records"), Alias::new("student_id"))
                            .to(Alias::new("group_members"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_records_session_student")
                    .table(Alias::new("attendance_records"))
                    .col(Alias::new("session_id"))
                    .col(Alias::new("student_id"))
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("attendance_records"))
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("attendance_sessions"))
                    .to_owned(),
            )
            .await
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Children {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Lessons {
    Table,
    Id,
    TherapistId,
    GroupId,
    StartsAt,
    EndsAt,
    Status,
    Evaluation,
    PaymentMethod,
    CommissionPercentAtTime,
    RevenueAtTime,
    TherapistShareAtTime,
    LeaderShareAtTime,
    SettledAt,
    PayoutStatus,
    PayoutRequestId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Enrollments {
    Table,
    Id,
    LessonId,
    ChildId,
    Status,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Lessons carry the settlement snapshot; `settled_at` is written exactly once.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Lessons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Lessons::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Lessons::TherapistId).integer().not_null())
                    .col(ColumnDef::new(Lessons::GroupId).integer().null())
                    .col(
                        ColumnDef::new(Lessons::StartsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Lessons::EndsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Lessons::Status)
                            .string_len(32)
                            .not_null()
                            .default("scheduled"),
                    )
                    .col(ColumnDef::new(Lessons::Evaluation).text().null())
                    .col(ColumnDef::new(Lessons::PaymentMethod).string_len(32).null())
                    .col(
                        ColumnDef::new(Lessons::CommissionPercentAtTime)
                            .integer()
                            .null(),
                    )
                    .col(ColumnDef::new(Lessons::RevenueAtTime).big_integer().null())
                    .col(
                        ColumnDef::new(Lessons::TherapistShareAtTime)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Lessons::LeaderShareAtTime)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Lessons::SettledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Lessons::PayoutStatus)
                            .string_len(32)
                            .not_null()
                            .default("none"),
                    )
                    .col(ColumnDef::new(Lessons::PayoutRequestId).integer().null())
                    .col(
                        ColumnDef::new(Lessons::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lessons_therapist")
                            .from(Lessons::Table, Lessons::TherapistId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lessons_group")
                            .from(Lessons::Table, Lessons::GroupId)
                            .to(Groups::Table, Groups::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lessons_therapist_starts")
                    .table(Lessons::Table)
                    .col(Lessons::TherapistId)
                    .col(Lessons::StartsAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Enrollments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Enrollments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Enrollments::LessonId).integer().not_null())
                    .col(ColumnDef::new(Enrollments::ChildId).integer().not_null())
                    .col(
                        ColumnDef::new(Enrollments::Status)
                            .string_len(32)
                            .not_null()
                            .default("enrolled"),
                    )
                    .col(
                        ColumnDef::new(Enrollments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_lesson")
                            .from(Enrollments::Table, Enrollments::LessonId)
                            .to(Lessons::Table, Lessons::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_child")
                            .from(Enrollments::Table, Enrollments::ChildId)
                            .to(Children::Table, Children::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_enrollments_lesson_child_unique")
                    .table(Enrollments::Table)
                    .col(Enrollments::LessonId)
                    .col(Enrollments::ChildId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(Enrollments::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Lessons::Table).to_owned())
            .await?;
        Ok(())
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
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
}

/// Time-ranged commission percent, history is append-only
#[derive(DeriveIden)]
enum CommissionRates {
    Table,
    Id,
    UserId,
    Percent,
    ValidFrom,
    ValidTo,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Passes {
    Table,
    Id,
    ChildId,
    TherapistId,
    TotalLessons,
    RemainingLessons,
    TotalPrice,
    ValidUntil,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PassUsages {
    Table,
    Id,
    PassId,
    LessonId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    Kind,
    Amount,
    UserId,
    BranchId,
    CompanyId,
    LessonId,
    PayoutRequestId,
    Meta,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PayoutRequests {
    Table,
    Id,
    UserId,
    BalanceSnapshot,
    CashHeldSnapshot,
    Amount,
    Status,
    ProcessedBy,
    ProcessedAt,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CommissionRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommissionRates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CommissionRates::UserId).integer().not_null())
                    .col(ColumnDef::new(CommissionRates::Percent).integer().not_null())
                    .col(
                        ColumnDef::new(CommissionRates::ValidFrom)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommissionRates::ValidTo)
                            .timestamp_with_time_zone()
                            .null(), // NULL = currently open
                    )
                    .col(
                        ColumnDef::new(CommissionRates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_commission_rates_user")
                            .from(CommissionRates::Table, CommissionRates::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_commission_rates_user_from")
                    .table(CommissionRates::Table)
                    .col(CommissionRates::UserId)
                    .col(CommissionRates::ValidFrom)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Passes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Passes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Passes::ChildId).integer().not_null())
                    .col(ColumnDef::new(Passes::TherapistId).integer().null())
                    .col(ColumnDef::new(Passes::TotalLessons).integer().not_null())
                    .col(ColumnDef::new(Passes::RemainingLessons).integer().not_null())
                    .col(ColumnDef::new(Passes::TotalPrice).big_integer().not_null())
                    .col(
                        ColumnDef::new(Passes::ValidUntil)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Passes::Status)
                            .string_len(32)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Passes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_passes_child")
                            .from(Passes::Table, Passes::ChildId)
                            .to(Children::Table, Children::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_passes_child_status")
                    .table(Passes::Table)
                    .col(Passes::ChildId)
                    .col(Passes::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PassUsages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PassUsages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PassUsages::PassId).integer().not_null())
                    .col(ColumnDef::new(PassUsages::LessonId).integer().not_null())
                    .col(
                        ColumnDef::new(PassUsages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pass_usages_pass")
                            .from(PassUsages::Table, PassUsages::PassId)
                            .to(Passes::Table, Passes::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pass_usages_lesson")
                            .from(PassUsages::Table, PassUsages::LessonId)
                            .to(Lessons::Table, Lessons::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // one usage per lesson: a lesson never consumes two pass units
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pass_usages_lesson_unique")
                    .table(PassUsages::Table)
                    .col(PassUsages::LessonId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PayoutRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PayoutRequests::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PayoutRequests::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(PayoutRequests::BalanceSnapshot)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PayoutRequests::CashHeldSnapshot)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PayoutRequests::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(PayoutRequests::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(PayoutRequests::ProcessedBy).integer().null())
                    .col(
                        ColumnDef::new(PayoutRequests::ProcessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PayoutRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payout_requests_user")
                            .from(PayoutRequests::Table, PayoutRequests::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Transactions::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::UserId).integer().not_null())
                    .col(ColumnDef::new(Transactions::BranchId).integer().null())
                    .col(ColumnDef::new(Transactions::CompanyId).integer().null())
                    .col(ColumnDef::new(Transactions::LessonId).integer().null())
                    .col(ColumnDef::new(Transactions::PayoutRequestId).integer().null())
                    .col(ColumnDef::new(Transactions::Meta).json().not_null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_user")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_user_kind")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::Kind)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_branch")
                    .table(Transactions::Table)
                    .col(Transactions::BranchId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_lesson")
                    .table(Transactions::Table)
                    .col(Transactions::LessonId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // drop order: ledger -> payouts -> usages -> passes -> rates
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(PayoutRequests::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(PassUsages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Passes::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(CommissionRates::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

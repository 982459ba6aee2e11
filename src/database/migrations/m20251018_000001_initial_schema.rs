use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_species_table(manager).await?;
        self.create_notes_table(manager).await?;
        self.create_results_table(manager).await?;
        self.create_note_reviews_table(manager).await?;
        self.create_note_comments_table(manager).await?;
        self.create_note_locks_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NoteLocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NoteComments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NoteReviews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Results::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Species::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    fn id_column(column: impl IntoIden) -> ColumnDef {
        ColumnDef::new(column)
            .integer()
            .not_null()
            .auto_increment()
            .primary_key()
            .to_owned()
    }

    fn note_fk(table: impl IntoIden + 'static, column: impl IntoIden, name: &str) -> ForeignKeyCreateStatement {
        ForeignKey::create()
            .name(name)
            .from(table, column)
            .to(Notes::Table, Notes::Id)
            .on_delete(ForeignKeyAction::Cascade)
            .on_update(ForeignKeyAction::NoAction)
            .to_owned()
    }

    async fn create_species_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Species::Table)
                    .if_not_exists()
                    .col(Self::id_column(Species::Id))
                    .col(
                        ColumnDef::new(Species::ScientificName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Species::CommonName).string().not_null())
                    .col(
                        ColumnDef::new(Species::SpeciesCode)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Species::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_notes_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notes::Table)
                    .if_not_exists()
                    .col(Self::id_column(Notes::Id))
                    .col(ColumnDef::new(Notes::SourceNode).string().not_null())
                    .col(ColumnDef::new(Notes::Date).string().not_null())
                    .col(ColumnDef::new(Notes::Time).string().not_null())
                    .col(ColumnDef::new(Notes::BeginTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notes::EndTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notes::SpeciesCode).string().not_null())
                    .col(ColumnDef::new(Notes::ScientificName).string().not_null())
                    .col(ColumnDef::new(Notes::CommonName).string().not_null())
                    .col(ColumnDef::new(Notes::Confidence).double().not_null())
                    .col(ColumnDef::new(Notes::Latitude).double().not_null())
                    .col(ColumnDef::new(Notes::Longitude).double().not_null())
                    .col(ColumnDef::new(Notes::Threshold).double().not_null())
                    .col(ColumnDef::new(Notes::Sensitivity).double().not_null())
                    .col(ColumnDef::new(Notes::ClipName).string().not_null())
                    .col(
                        ColumnDef::new(Notes::ProcessingTimeNs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_results_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Results::Table)
                    .if_not_exists()
                    .col(Self::id_column(Results::Id))
                    .col(ColumnDef::new(Results::NoteId).integer().not_null())
                    .col(ColumnDef::new(Results::Species).string().not_null())
                    .col(ColumnDef::new(Results::Confidence).float().not_null())
                    .foreign_key(&mut Self::note_fk(
                        Results::Table,
                        Results::NoteId,
                        "fk_results_note_id",
                    ))
                    .to_owned(),
            )
            .await
    }

    async fn create_note_reviews_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NoteReviews::Table)
                    .if_not_exists()
                    .col(Self::id_column(NoteReviews::Id))
                    .col(
                        ColumnDef::new(NoteReviews::NoteId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(NoteReviews::Verified).string().not_null())
                    .col(
                        ColumnDef::new(NoteReviews::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NoteReviews::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(&mut Self::note_fk(
                        NoteReviews::Table,
                        NoteReviews::NoteId,
                        "fk_note_reviews_note_id",
                    ))
                    .to_owned(),
            )
            .await
    }

    async fn create_note_comments_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NoteComments::Table)
                    .if_not_exists()
                    .col(Self::id_column(NoteComments::Id))
                    .col(ColumnDef::new(NoteComments::NoteId).integer().not_null())
                    .col(ColumnDef::new(NoteComments::Entry).text().not_null())
                    .col(
                        ColumnDef::new(NoteComments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NoteComments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(&mut Self::note_fk(
                        NoteComments::Table,
                        NoteComments::NoteId,
                        "fk_note_comments_note_id",
                    ))
                    .to_owned(),
            )
            .await
    }

    async fn create_note_locks_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NoteLocks::Table)
                    .if_not_exists()
                    .col(Self::id_column(NoteLocks::Id))
                    .col(
                        ColumnDef::new(NoteLocks::NoteId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(NoteLocks::LockedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(&mut Self::note_fk(
                        NoteLocks::Table,
                        NoteLocks::NoteId,
                        "fk_note_locks_note_id",
                    ))
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        let indexes = [
            Index::create()
                .name("idx_species_species_code")
                .table(Species::Table)
                .col(Species::SpeciesCode)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_notes_date")
                .table(Notes::Table)
                .col(Notes::Date)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_notes_date_time")
                .table(Notes::Table)
                .col(Notes::Date)
                .col(Notes::Time)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_notes_scientific_name")
                .table(Notes::Table)
                .col(Notes::ScientificName)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_notes_common_name")
                .table(Notes::Table)
                .col(Notes::CommonName)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_results_note_id")
                .table(Results::Table)
                .col(Results::NoteId)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_note_comments_note_id")
                .table(NoteComments::Table)
                .col(NoteComments::NoteId)
                .if_not_exists()
                .to_owned(),
        ];

        for index in indexes {
            manager.create_index(index).await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Species {
    Table,
    Id,
    ScientificName,
    CommonName,
    SpeciesCode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notes {
    Table,
    Id,
    SourceNode,
    Date,
    Time,
    BeginTime,
    EndTime,
    SpeciesCode,
    ScientificName,
    CommonName,
    Confidence,
    Latitude,
    Longitude,
    Threshold,
    Sensitivity,
    ClipName,
    ProcessingTimeNs,
}

#[derive(DeriveIden)]
enum Results {
    Table,
    Id,
    NoteId,
    Species,
    Confidence,
}

#[derive(DeriveIden)]
enum NoteReviews {
    Table,
    Id,
    NoteId,
    Verified,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NoteComments {
    Table,
    Id,
    NoteId,
    Entry,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NoteLocks {
    Table,
    Id,
    NoteId,
    LockedAt,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Mirrored playlists. The liked-songs library never gets a row.
        manager
            .create_table(
                Table::create()
                    .table(Playlist::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Playlist::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Playlist::Name).string().not_null())
                    .col(ColumnDef::new(Playlist::TotalTracks).integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Mirrored tracks of the current fetch target. A null playlist_id means liked songs.
        // playlist_id refers to playlist.id through the entity relation only; the two tables
        // are replaced independently, so no constraint is enforced here.
        manager
            .create_table(
                Table::create()
                    .table(Track::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Track::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Track::PlaylistId).string())
                    .col(ColumnDef::new(Track::Name).string().not_null())
                    .col(ColumnDef::new(Track::Album).string().not_null())
                    .col(ColumnDef::new(Track::Artists).string().not_null())
                    .col(ColumnDef::new(Track::ReleaseDate).string().not_null())
                    .col(ColumnDef::new(Track::DiscNumber).integer().not_null())
                    .col(ColumnDef::new(Track::TrackNumber).integer().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Track::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Playlist::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Playlist {
    Table,
    Id,
    Name,
    TotalTracks,
}

#[derive(DeriveIden)]
enum Track {
    Table,
    Id,
    PlaylistId,
    Name,
    Album,
    Artists,
    ReleaseDate,
    DiscNumber,
    TrackNumber,
}

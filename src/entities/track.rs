use sea_orm::entity::prelude::*;

/// A mirrored track of the current fetch target.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "track")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// `None` when the track belongs to the liked-songs library
    pub playlist_id: Option<String>,
    pub name: String,
    pub album: String,
    pub artists: String, // album artists joined with ", "
    pub release_date: String,
    pub disc_number: i32,
    pub track_number: i32,

    #[sea_orm(belongs_to, from = "playlist_id", to = "id")]
    pub playlist: HasOne<super::playlist::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}

use std::fmt;

use sea_orm::sea_query::Expr;
use sea_orm::{EntityTrait, IdenStatic, QueryOrder, Select};

use crate::entities;
use crate::error::EngineError;
use crate::ports::spotify::PlaylistTarget;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn inverted(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Track attributes an ordering can sort on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TrackSortField {
    Id,
    Name,
    Album,
    Artists,
    ReleaseDate,
    DiscNumber,
    TrackNumber,
}

impl TrackSortField {
    /// Convert the enum variant to the corresponding Sea-ORM column
    pub fn to_column(self) -> entities::track::Column {
        match self {
            Self::Id => entities::track::Column::Id,
            Self::Name => entities::track::Column::Name,
            Self::Album => entities::track::Column::Album,
            Self::Artists => entities::track::Column::Artists,
            Self::ReleaseDate => entities::track::Column::ReleaseDate,
            Self::DiscNumber => entities::track::Column::DiscNumber,
            Self::TrackNumber => entities::track::Column::TrackNumber,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SortKey {
    pub field: TrackSortField,
    pub order: SortOrder,
    pub case_insensitive: bool,
}

impl SortKey {
    const fn asc(field: TrackSortField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
            case_insensitive: false,
        }
    }

    const fn desc(field: TrackSortField) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
            case_insensitive: false,
        }
    }

    const fn nocase(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// The sort term without its direction, e.g. `album COLLATE NOCASE`
    fn term(&self) -> String {
        let column = self.field.to_column();
        if self.case_insensitive {
            format!("{} COLLATE NOCASE", column.as_str())
        } else {
            column.as_str().to_string()
        }
    }
}

/// A resolved order over the mirrored tracks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TrackOrder {
    /// Sort keys, first has highest priority
    Keys(Vec<SortKey>),
    /// A fresh uniform permutation on every read
    Random,
}

impl TrackOrder {
    /// Order used when any deterministic order will do
    pub fn by_id() -> Self {
        Self::Keys(vec![SortKey::asc(TrackSortField::Id)])
    }

    /// Swap the direction of every key. Random has no direction and stays as is.
    pub fn inverted(&self) -> Self {
        match self {
            Self::Keys(keys) => Self::Keys(
                keys.iter()
                    .map(|key| SortKey {
                        order: key.order.inverted(),
                        ..*key
                    })
                    .collect(),
            ),
            Self::Random => Self::Random,
        }
    }

    /// Canonical SQL text of the order, for display and logging
    pub fn to_sql(&self) -> String {
        match self {
            Self::Keys(keys) => keys
                .iter()
                .map(|key| format!("{} {}", key.term(), key.order.as_sql()))
                .collect::<Vec<_>>()
                .join(", "),
            Self::Random => "RANDOM()".to_string(),
        }
    }
}

impl fmt::Display for TrackOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// A user-selectable ordering from the catalog.
#[derive(Clone, Debug)]
pub struct NamedOrdering {
    pub name: &'static str,
    pub order: TrackOrder,
}

/// The fixed ordering catalog, in display order.
pub fn catalog() -> Vec<NamedOrdering> {
    use TrackSortField::*;

    vec![
        NamedOrdering {
            name: "Album",
            order: TrackOrder::Keys(vec![
                SortKey::asc(Album).nocase(),
                SortKey::asc(DiscNumber),
                SortKey::asc(TrackNumber),
            ]),
        },
        NamedOrdering {
            name: "Artist",
            order: TrackOrder::Keys(vec![
                SortKey::asc(Artists).nocase(),
                SortKey::asc(ReleaseDate),
                SortKey::asc(Album).nocase(),
                SortKey::asc(DiscNumber),
                SortKey::asc(TrackNumber),
            ]),
        },
        NamedOrdering {
            name: "Random",
            order: TrackOrder::Random,
        },
        NamedOrdering {
            name: "Release date",
            order: TrackOrder::Keys(vec![
                SortKey::desc(ReleaseDate),
                SortKey::asc(Album).nocase(),
                SortKey::asc(DiscNumber),
                SortKey::asc(TrackNumber),
            ]),
        },
        NamedOrdering {
            name: "Track name",
            order: TrackOrder::Keys(vec![
                SortKey::asc(Name).nocase(),
                SortKey::asc(Album).nocase(),
            ]),
        },
    ]
}

/// Resolve a catalog name (case-insensitive) into the order to read the mirror with.
///
/// The liked-songs library lists the most recently saved track first, so it gets the
/// inverted order.
pub fn resolve(name: &str, target: &PlaylistTarget) -> Result<TrackOrder, EngineError> {
    let orderings = catalog();
    let Some(ordering) = orderings
        .iter()
        .find(|ordering| ordering.name.eq_ignore_ascii_case(name.trim()))
    else {
        return Err(EngineError::UnknownOrdering {
            name: name.to_string(),
            available: orderings
                .iter()
                .map(|ordering| ordering.name)
                .collect::<Vec<_>>()
                .join(", "),
        });
    };

    let order = match target {
        PlaylistTarget::Playlist(_) => ordering.order.clone(),
        PlaylistTarget::LikedSongs => ordering.order.inverted(),
    };
    log::debug!("Resolved ordering '{}' for {}: {}", ordering.name, target, order);
    Ok(order)
}

/// Apply an order to a track query.
pub fn apply_order(
    mut query: Select<entities::track::Entity>,
    order: &TrackOrder,
) -> Select<entities::track::Entity> {
    match order {
        TrackOrder::Keys(keys) => {
            for key in keys {
                let term = Expr::cust(key.term());
                query = match key.order {
                    SortOrder::Asc => query.order_by_asc(term),
                    SortOrder::Desc => query.order_by_desc(term),
                };
            }
            query
        }
        TrackOrder::Random => query.order_by_asc(Expr::cust("RANDOM()")),
    }
}

/// Plain query over all mirrored tracks in the given order
pub fn ordered_tracks(order: &TrackOrder) -> Select<entities::track::Entity> {
    apply_order(entities::track::Entity::find(), order)
}

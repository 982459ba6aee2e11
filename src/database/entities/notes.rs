use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub source_node: String,
    pub date: String,
    pub time: String,
    pub begin_time: Option<DateTimeUtc>,
    pub end_time: Option<DateTimeUtc>,
    pub species_code: String,
    pub scientific_name: String,
    pub common_name: String,
    pub confidence: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub threshold: f64,
    pub sensitivity: f64,
    pub clip_name: String,
    pub processing_time_ns: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::results::Entity")]
    Results,
    #[sea_orm(has_one = "super::note_reviews::Entity")]
    Review,
    #[sea_orm(has_many = "super::note_comments::Entity")]
    Comments,
    #[sea_orm(has_one = "super::note_locks::Entity")]
    Lock,
}

impl Related<super::results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Results.def()
    }
}

impl Related<super::note_reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl Related<super::note_comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::note_locks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

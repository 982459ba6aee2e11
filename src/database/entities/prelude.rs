pub use super::note_comments::Entity as NoteComments;
pub use super::note_locks::Entity as NoteLocks;
pub use super::note_reviews::Entity as NoteReviews;
pub use super::notes::Entity as Notes;
pub use super::results::Entity as Results;
pub use super::species::Entity as Species;

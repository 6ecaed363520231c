pub mod lifecycle;
pub mod waiting_room;

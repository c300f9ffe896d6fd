pub mod attendance;
pub mod classroom;
pub mod enrollment;
pub mod role;
pub mod timetable;
pub mod user;

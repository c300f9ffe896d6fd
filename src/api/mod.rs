pub mod attendance;
pub mod classroom;
pub mod timetable;

//! Operations across trees

mod diff;

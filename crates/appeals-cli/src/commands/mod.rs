pub mod check_duplicate;
pub mod lifecycle;
pub mod register;
pub mod show;

pub mod auth;
pub mod careers;
pub mod courses;
pub mod dashboard;
pub mod enrollments;
pub mod grades;
pub mod health;
pub mod instructors;
pub mod persons;
pub mod rbac;
pub mod reports;
pub mod sections;
pub mod students;
pub mod users;

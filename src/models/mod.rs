pub mod career;
pub mod course;
pub mod enrollment;
pub mod grade;
pub mod instructor;
pub mod pagination;
pub mod person;
pub mod rbac;
pub mod section;
pub mod student;
pub mod user;

//! Page/per-page handling shared by every list endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::career::Career;
use super::course::Course;
use super::enrollment::Enrollment;
use super::grade::Grade;
use super::instructor::Instructor;
use super::person::Person;
use super::section::Section;
use super::student::Student;
use super::user::User;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Self {
        Self { page, per_page }
    }

    /// 1-based; zero is treated as the first page.
    pub fn page(&self) -> u64 {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn limit(&self) -> i64 {
        self.per_page() as i64
    }

    pub fn offset(&self) -> i64 {
        ((self.page() - 1) * self.per_page()) as i64
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(
    CareerPage = Paginated<Career>,
    CoursePage = Paginated<Course>,
    PersonPage = Paginated<Person>,
    StudentPage = Paginated<Student>,
    InstructorPage = Paginated<Instructor>,
    SectionPage = Paginated<Section>,
    EnrollmentPage = Paginated<Enrollment>,
    GradePage = Paginated<Grade>,
    UserPage = Paginated<User>
)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total: i64) -> Self {
        let per_page = params.per_page();
        let total = total.max(0) as u64;

        Self {
            data,
            meta: PaginationMeta {
                page: params.page(),
                per_page,
                total,
                total_pages: total.div_ceil(per_page),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_caps() {
        let params = PaginationParams::default();
        assert_eq!((params.page(), params.per_page(), params.offset()), (1, 10, 0));

        let params = PaginationParams::new(Some(3), Some(500));
        assert_eq!(params.per_page(), MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 200);

        let params = PaginationParams::new(Some(0), Some(0));
        assert_eq!((params.page(), params.per_page()), (1, 1));
    }

    #[test]
    fn meta_counts_partial_last_page() {
        let page = Paginated::new(vec![1, 2], &PaginationParams::new(Some(2), Some(5)), 7);
        assert_eq!(page.meta.total_pages, 2);
        assert_eq!(page.meta.total, 7);

        let empty: Paginated<i32> = Paginated::new(Vec::new(), &PaginationParams::default(), 0);
        assert_eq!(empty.meta.total_pages, 0);
    }
}

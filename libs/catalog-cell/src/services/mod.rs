pub mod catalog;
pub mod doctors;
pub mod pricing;

pub use catalog::CatalogService;
pub use doctors::DoctorDirectoryService;
pub use pricing::PriceLookupService;

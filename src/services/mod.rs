pub mod auth_service;
pub mod catalog_service;
pub mod ledger_service;
pub mod request_service;
pub mod session_service;

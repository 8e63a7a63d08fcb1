pub mod access_service;
pub mod connection_service;
pub mod exam_catalog;
pub mod exam_link_service;
pub mod gateway_client;
pub mod redirect;
pub mod session_service;
pub mod token_service;

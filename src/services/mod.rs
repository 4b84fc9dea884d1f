pub mod definition_service;

pub use definition_service::DefinitionService;

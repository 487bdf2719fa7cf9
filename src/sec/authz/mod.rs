pub mod rbac;
pub mod settings;

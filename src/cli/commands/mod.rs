pub mod audit_cmd;
pub mod completions;
pub mod delete;
pub mod export;
pub mod get;
pub mod import_cmd;
pub mod list;
pub mod rename;
pub mod set;

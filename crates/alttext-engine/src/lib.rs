pub mod context;
pub mod discovery;
pub mod error;
pub mod model;
pub mod patcher;
pub mod queue;
pub mod scanner;
pub mod syntax;
pub mod text;

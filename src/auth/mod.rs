pub mod oauth;
pub mod session;
pub mod token_store;
pub mod tokens_file;

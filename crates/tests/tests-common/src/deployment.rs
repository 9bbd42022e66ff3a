//! Deployment functions used across test cases.

use std::path::PathBuf;

/// The credentials and address of the banking database started for the test suites.
pub const BANKING_HOST: &str = "localhost";
pub const BANKING_PORT: u16 = 64002;
pub const BANKING_DBNAME: &str = "postgres";
pub const BANKING_USER: &str = "postgres";
pub const BANKING_PASSWORD: &str = "password";

/// Find the project root via the crate root provided by `cargo test`, and resolve a path in it.
/// This depends on the convention that all our crates live in `/crates/<group>/<name>`.
pub fn get_path_from_project_root(path: &str) -> PathBuf {
    let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    d.push("../../../");
    d.push(path);
    d
}

/// A request body aimed at the banking database.
pub fn banking_request(query: &str) -> serde_json::Value {
    serde_json::json!({
        "query": query,
        "host": BANKING_HOST,
        "port": BANKING_PORT,
        "dbname": BANKING_DBNAME,
        "db_user": BANKING_USER,
        "db_password": BANKING_PASSWORD,
    })
}

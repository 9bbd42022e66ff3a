//! The request body shared by both endpoints, and how it becomes connection parameters.

use chatdb_configuration::DatabaseDefaults;
use query_engine_execution::ConnectionParams;
use serde::Deserialize;
use thiserror::Error;

/// Accepted as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Port {
    Number(u64),
    Text(String),
}

/// `{query, host, dbname, port, db_user, db_password}`. Anything but `query` may be left to the
/// server's configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineRequest {
    #[serde(default)]
    pub query: Option<serde_json::Value>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub dbname: Option<String>,
    #[serde(default)]
    pub port: Option<Port>,
    #[serde(default)]
    pub db_user: Option<String>,
    #[serde(default)]
    pub db_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Request body must be a JSON object: {0}")]
    InvalidBody(String),
    #[error("Missing or invalid 'query' field")]
    MissingQuery,
    #[error("Missing or invalid '{0}' field")]
    MissingField(&'static str),
    #[error("Invalid 'port' field: {0}")]
    InvalidPort(String),
    #[error("Database credentials not provided")]
    MissingCredentials,
}

impl PipelineRequest {
    pub fn from_body(body: &[u8]) -> Result<Self, RequestError> {
        serde_json::from_slice(body).map_err(|err| RequestError::InvalidBody(err.to_string()))
    }

    /// Split the request into its query text and where to run it.
    pub fn resolve(
        self,
        defaults: &DatabaseDefaults,
    ) -> Result<(String, ConnectionParams), RequestError> {
        let query = match self.query {
            Some(serde_json::Value::String(query)) if !query.trim().is_empty() => query,
            _ => return Err(RequestError::MissingQuery),
        };

        let user = provided(self.db_user).or_else(|| defaults.user.clone());
        let password = self.db_password.or_else(|| defaults.password.clone());
        let (Some(user), Some(password)) = (user, password) else {
            return Err(RequestError::MissingCredentials);
        };

        let host = provided(self.host)
            .or_else(|| defaults.host.clone())
            .ok_or(RequestError::MissingField("host"))?;
        let dbname = provided(self.dbname)
            .or_else(|| defaults.dbname.clone())
            .ok_or(RequestError::MissingField("dbname"))?;
        let port = match self.port {
            None => defaults.port,
            Some(port) => parse_port(&port)?,
        };

        Ok((
            query,
            ConnectionParams {
                host,
                port,
                dbname,
                user,
                password,
            },
        ))
    }
}

fn provided(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_port(port: &Port) -> Result<u16, RequestError> {
    let parsed = match port {
        Port::Number(number) => u16::try_from(*number).ok(),
        Port::Text(text) => text.trim().parse::<u16>().ok(),
    };
    match parsed {
        Some(port) if port > 0 => Ok(port),
        _ => Err(RequestError::InvalidPort(match port {
            Port::Number(number) => number.to_string(),
            Port::Text(text) => format!("'{text}'"),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> DatabaseDefaults {
        DatabaseDefaults {
            host: Some("db.internal".to_string()),
            dbname: Some("banking".to_string()),
            port: 5432,
            user: None,
            password: None,
        }
    }

    fn request(body: serde_json::Value) -> PipelineRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn fills_in_defaults() {
        let (query, params) = request(serde_json::json!({
            "query": "list customers",
            "db_user": "postgres",
            "db_password": "secret"
        }))
        .resolve(&defaults())
        .unwrap();
        assert_eq!(query, "list customers");
        assert_eq!(params.host, "db.internal");
        assert_eq!(params.dbname, "banking");
        assert_eq!(params.port, 5432);
    }

    #[test]
    fn accepts_numeric_string_ports() {
        let (_, params) = request(serde_json::json!({
            "query": "list customers",
            "port": "6543",
            "db_user": "postgres",
            "db_password": "secret"
        }))
        .resolve(&defaults())
        .unwrap();
        assert_eq!(params.port, 6543);
    }

    #[test]
    fn rejects_bad_ports() {
        for port in [serde_json::json!("abc"), serde_json::json!(70000), serde_json::json!(0)] {
            let result = request(serde_json::json!({
                "query": "q", "port": port, "db_user": "u", "db_password": "p"
            }))
            .resolve(&defaults());
            assert!(matches!(result, Err(RequestError::InvalidPort(_))), "{port}");
        }
    }

    #[test]
    fn query_must_be_a_non_blank_string() {
        for query in [serde_json::json!(null), serde_json::json!("   "), serde_json::json!(42)] {
            let result = request(serde_json::json!({
                "query": query, "db_user": "u", "db_password": "p"
            }))
            .resolve(&defaults());
            assert_eq!(result.unwrap_err(), RequestError::MissingQuery);
        }
    }

    #[test]
    fn credentials_are_required_without_defaults() {
        let result = request(serde_json::json!({"query": "list customers"})).resolve(&defaults());
        assert_eq!(result.unwrap_err(), RequestError::MissingCredentials);
        assert_eq!(
            RequestError::MissingCredentials.to_string(),
            "Database credentials not provided"
        );
    }

    #[test]
    fn host_is_required_without_a_default() {
        let result = request(serde_json::json!({
            "query": "q", "db_user": "u", "db_password": "p"
        }))
        .resolve(&DatabaseDefaults::default());
        assert_eq!(result.unwrap_err(), RequestError::MissingField("host"));
    }

    #[test]
    fn bodies_must_be_json() {
        assert!(matches!(
            PipelineRequest::from_body(b"query=hello"),
            Err(RequestError::InvalidBody(_))
        ));
    }
}

//! Build the deterministic prompt sent to the language model.

use query_engine_metadata::metadata::{Nullable, SchemaDescription};

use super::model::{ChatMessage, Role};

/// The answer the model gives when it cannot produce a query.
pub const REFUSAL_SENTINEL: &str = "X";

const INSTRUCTIONS_TEMPLATE: &str = r#"You are a SQL generation assistant. Given a natural language instruction, generate one executable SQL statement (PostgreSQL dialect) as a plain string, based on the following database schema:

{schema}

Rules:
- Generate exactly one statement, and only SELECT, INSERT, UPDATE or DELETE. Use only the tables and columns listed in the schema.
- Clauses you may use are FROM, JOIN, WHERE, GROUP BY, HAVING, ORDER BY, LIMIT and OFFSET.
- If the instruction references tables or columns not in the schema, return exactly the single character "X" with no additional text.
- If the instruction is ambiguous, unsafe, or cannot be converted to a valid SQL query, return exactly the single character "X" with no additional text.
- Join tables through the foreign keys listed in the schema, or through matching column names.
- For INSERT, include all required columns unless specified; use reasonable defaults if needed.
- For UPDATE and DELETE, include a WHERE clause to avoid affecting unintended rows.
- If asked to explain why a query could not be generated, return a non-empty sentence explaining the specific reason.
- Output only the SQL statement, or exactly "X". No prose, no Markdown, no comments, no explanation.
- Examples:
  - Input: "Get all customers with lastname Smith" -> Output: "SELECT * FROM customers WHERE lastname = 'Smith';"
  - Input: "Add a new customer with first name John, last name Doe, and email john.doe@example.com" -> Output: "INSERT INTO customers (customerid, firstname, lastname, email, phonenumber, address) VALUES ('CUST001', 'John', 'Doe', 'john.doe@example.com', NULL, NULL);"
  - Input: "Update the salary of employee with employeeid E001 to 60000" -> Output: "UPDATE employees SET salary = 60000 WHERE employeeid = 'E001';"
  - Input: "Delete the account with accountid A001" -> Output: "DELETE FROM accounts WHERE accountid = 'A001';"
  - Input: "Find the name of the manager who manages the Downtown branch" -> Output: "SELECT e.firstname FROM branches b JOIN employees e ON b.managerid = e.employeeid WHERE b.branchname = 'Downtown';"
  - Input: "List employees who are not managers, ordered by name" -> Output: "SELECT e.firstname || ' ' || e.lastname AS name, e.jobtitle FROM employees e WHERE e.employeeid NOT IN (SELECT managerid FROM branches) ORDER BY name ASC;"
  - Input: "Get all orders with price > 100" -> Output: "X"
  - Input: "You failed to generate an SQL query for the instruction: 'Get all orders with price > 100'. Please explain why the query could not be generated (e.g., non-existent table, invalid column, ambiguous instruction). Provide a specific, non-empty explanation." -> Output: "Table 'orders' does not exist"
  - Input: "You failed to generate an SQL query for the instruction: 'Get all employees with age > 30'. Please explain why the query could not be generated (e.g., non-existent table, invalid column, ambiguous instruction). Provide a specific, non-empty explanation." -> Output: "Column 'age' does not exist in table 'employees'""#;

/// The two halves of a prompt: fixed instructions embedding the schema, and the user's words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub instructions: String,
    pub query: String,
}

impl Prompt {
    /// The conversation opening the translation.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(Role::System, self.instructions.clone()),
            ChatMessage::new(Role::User, self.query.clone()),
        ]
    }

    /// The follow-up asking the model why it refused.
    pub fn explanation_request(&self) -> String {
        format!(
            "You failed to generate an SQL query for the instruction: '{}'. Please explain why the query could not be generated (e.g., non-existent table, invalid column, ambiguous instruction). Provide a specific, non-empty explanation.",
            self.query
        )
    }
}

/// Combine a natural-language query and a schema description into a prompt.
///
/// The result depends only on its inputs.
pub fn build_prompt(query: &str, schema: &SchemaDescription) -> Prompt {
    Prompt {
        instructions: INSTRUCTIONS_TEMPLATE.replace("{schema}", &serialize_schema(schema)),
        query: query.trim().to_string(),
    }
}

/// Render the schema one table per block, columns in declaration order.
pub fn serialize_schema(schema: &SchemaDescription) -> String {
    if schema.tables.is_empty() {
        return "(no tables)".to_string();
    }

    let mut out = String::new();
    for (i, table) in schema.tables.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "TABLE {}.{}\n",
            table.schema_name, table.table_name
        ));
        for column in &table.columns {
            out.push_str(&format!("  {} {}", column.name, column.r#type));
            if column.nullable == Nullable::NonNullable {
                out.push_str(" NOT NULL");
            }
            if column.is_primary_key {
                out.push_str(" PRIMARY KEY");
            }
            if let Some(foreign_key) = &column.foreign_key {
                out.push_str(&format!(
                    " REFERENCES {}({})",
                    foreign_key.table, foreign_key.column
                ));
            }
            out.push('\n');
        }
    }
    out.truncate(out.trim_end().len());
    out
}

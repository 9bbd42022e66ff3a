//! These tests need the sample database: a PostgreSQL server on localhost:64002 with
//! `static/banking.sql` loaded. Run them with `--ignored`.

mod common;

use std::time::Duration;

use query_engine_execution::{
    execute, introspect, ConnectionError, ExecutionError, ExecutionOutcome,
};
use query_engine_metadata::metadata::{ForeignKey, Nullable, PortableType};
use query_engine_sql::sql::validate;

#[tokio::test]
#[ignore]
async fn introspection_reads_tables_columns_and_keys() {
    let registry = common::registry();
    let mut connection = registry.acquire(&common::banking_params()).await.unwrap();
    let schema = introspect(&mut connection, common::TIMEOUT).await.unwrap();

    let accounts = schema.find_table("accounts").expect("accounts is visible");
    let names: Vec<&str> = accounts.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        ["accountid", "customerid", "accounttype", "balance", "opendate"]
    );

    let accountid = accounts.find_column("accountid").unwrap();
    assert!(accountid.is_primary_key);
    assert_eq!(accountid.nullable, Nullable::NonNullable);

    let customerid = accounts.find_column("customerid").unwrap();
    assert_eq!(
        customerid.foreign_key,
        Some(ForeignKey {
            table: "customers".to_string(),
            column: "customerid".to_string()
        })
    );
    assert_eq!(accounts.find_column("balance").unwrap().r#type, PortableType::Decimal);
    assert_eq!(accounts.find_column("opendate").unwrap().r#type, PortableType::Timestamp);

    let customers = schema.find_table("customers").unwrap();
    assert_eq!(customers.find_column("email").unwrap().nullable, Nullable::Nullable);
}

#[tokio::test]
#[ignore]
async fn reads_return_records_in_projection_order() {
    let registry = common::registry();
    let mut connection = registry.acquire(&common::banking_params()).await.unwrap();
    let schema = introspect(&mut connection, common::TIMEOUT).await.unwrap();

    let statement = validate(
        "SELECT c.lastname, c.firstname, a.balance, c.phonenumber \
         FROM customers c JOIN accounts a ON a.customerid = c.customerid \
         WHERE a.balance > 2000 ORDER BY c.lastname ASC LIMIT 3",
        &schema,
    )
    .unwrap();

    let first = execute(&mut connection, &statement, common::TIMEOUT).await.unwrap();
    let ExecutionOutcome::Rows(records) = &first else {
        panic!("expected rows, got {first:?}");
    };
    assert!(records.len() <= 3);
    let columns: Vec<&str> = records[0].keys().map(String::as_str).collect();
    assert_eq!(columns, ["lastname", "firstname", "balance", "phonenumber"]);
    let lastnames: Vec<&str> = records
        .iter()
        .map(|record| record["lastname"].as_str().unwrap())
        .collect();
    let mut sorted = lastnames.clone();
    sorted.sort_unstable();
    assert_eq!(lastnames, sorted);

    // no intervening writes: the same rows come back
    let second = execute(&mut connection, &statement, common::TIMEOUT).await.unwrap();
    similar_asserts::assert_eq!(first, second);

    // NULL is kept as an explicit null
    let statement = validate(
        "SELECT customerid, phonenumber FROM customers WHERE customerid = 'CUST003'",
        &schema,
    )
    .unwrap();
    match execute(&mut connection, &statement, common::TIMEOUT).await.unwrap() {
        ExecutionOutcome::Rows(records) => {
            assert_eq!(records[0].get("phonenumber"), Some(&serde_json::Value::Null));
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn writes_report_affected_rows_and_are_committed() {
    let registry = common::registry();
    let params = common::banking_params();
    let mut connection = registry.acquire(&params).await.unwrap();
    let schema = introspect(&mut connection, common::TIMEOUT).await.unwrap();

    let insert = validate(
        "INSERT INTO customers (customerid, firstname, lastname, email, phonenumber) \
         VALUES ('CUST900', 'Michael', 'Chen', 'michael.chen@example.com', '555-987-6543')",
        &schema,
    )
    .unwrap();
    assert_eq!(
        execute(&mut connection, &insert, common::TIMEOUT).await.unwrap(),
        ExecutionOutcome::RowsAffected(1)
    );
    connection.release().await;

    // visible from another connection
    let mut other = registry.acquire(&params).await.unwrap();
    let check = validate("SELECT email FROM customers WHERE customerid = 'CUST900'", &schema).unwrap();
    match execute(&mut other, &check, common::TIMEOUT).await.unwrap() {
        ExecutionOutcome::Rows(records) => assert_eq!(records.len(), 1),
        other => panic!("expected rows, got {other:?}"),
    }

    let delete = validate(
        "DELETE FROM customers WHERE customerid = 'CUST900' RETURNING customerid",
        &schema,
    )
    .unwrap();
    match execute(&mut other, &delete, common::TIMEOUT).await.unwrap() {
        ExecutionOutcome::Rows(records) => {
            assert_eq!(records[0]["customerid"], "CUST900");
        }
        outcome => panic!("expected the returned rows, got {outcome:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn backend_errors_are_reported_verbatim() {
    let registry = common::registry();
    let mut connection = registry.acquire(&common::banking_params()).await.unwrap();
    let schema = introspect(&mut connection, common::TIMEOUT).await.unwrap();

    let duplicate = validate(
        "INSERT INTO customers (customerid, firstname, lastname) VALUES ('CUST001', 'A', 'B')",
        &schema,
    )
    .unwrap();
    match execute(&mut connection, &duplicate, common::TIMEOUT).await {
        Err(ExecutionError::Database { code, message }) => {
            assert_eq!(code, "23505");
            assert!(message.contains("customers_pkey"), "{message}");
        }
        other => panic!("expected a unique violation, got {other:?}"),
    }

    let type_error = validate("SELECT * FROM accounts WHERE balance = 'lots'", &schema).unwrap();
    match execute(&mut connection, &type_error, common::TIMEOUT).await {
        Err(ExecutionError::Database { code, .. }) => assert_eq!(code, "22P02"),
        other => panic!("expected an invalid text representation, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn reads_cannot_write() {
    let registry = common::registry();
    let mut connection = registry.acquire(&common::banking_params()).await.unwrap();
    let schema = introspect(&mut connection, common::TIMEOUT).await.unwrap();

    let locking = validate("SELECT * FROM customers FOR UPDATE", &schema).unwrap();
    match execute(&mut connection, &locking, common::TIMEOUT).await {
        Err(ExecutionError::Database { code, .. }) => assert_eq!(code, "25006"),
        other => panic!("expected a read-only transaction error, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn long_statements_time_out() {
    let registry = common::registry();
    let mut connection = registry.acquire(&common::banking_params()).await.unwrap();
    let schema = introspect(&mut connection, common::TIMEOUT).await.unwrap();

    let statement = validate("SELECT pg_sleep(5)", &schema).unwrap();
    assert_eq!(
        execute(&mut connection, &statement, Duration::from_millis(200)).await,
        Err(ExecutionError::Timeout(Duration::from_millis(200)))
    );
}

#[tokio::test]
#[ignore]
async fn wrong_password_is_rejected_with_its_sqlstate() {
    let registry = common::registry();
    let params = query_engine_execution::ConnectionParams {
        password: "wrong".to_string(),
        ..common::banking_params()
    };
    match registry.acquire(&params).await {
        Err(ConnectionError::Rejected { code, .. }) => assert_eq!(code, "28P01"),
        other => panic!("expected an authentication failure, got {other:?}"),
    }
}

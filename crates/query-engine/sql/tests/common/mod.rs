use query_engine_metadata::metadata::{
    ColumnInfo, ForeignKey, Nullable, PortableType, SchemaDescription, TableInfo,
};

fn column(name: &str, r#type: PortableType) -> ColumnInfo {
    ColumnInfo::new(name, r#type)
}

fn key(name: &str) -> ColumnInfo {
    ColumnInfo {
        nullable: Nullable::NonNullable,
        is_primary_key: true,
        ..ColumnInfo::new(name, PortableType::Text)
    }
}

fn reference(name: &str, table: &str, target: &str) -> ColumnInfo {
    ColumnInfo {
        foreign_key: Some(ForeignKey {
            table: table.to_string(),
            column: target.to_string(),
        }),
        ..ColumnInfo::new(name, PortableType::Text)
    }
}

fn table(name: &str, columns: Vec<ColumnInfo>) -> TableInfo {
    TableInfo {
        schema_name: "public".to_string(),
        table_name: name.to_string(),
        columns,
    }
}

/// The banking database used throughout the tests.
pub fn banking_schema() -> SchemaDescription {
    SchemaDescription::new(vec![
        table(
            "accounts",
            vec![
                key("accountid"),
                reference("customerid", "customers", "customerid"),
                column("accounttype", PortableType::Text),
                column("balance", PortableType::Decimal),
                column("opendate", PortableType::Timestamp),
            ],
        ),
        table(
            "branches",
            vec![
                key("branchid"),
                column("branchname", PortableType::Text),
                column("address", PortableType::Text),
                reference("managerid", "employees", "employeeid"),
            ],
        ),
        table(
            "customers",
            vec![
                key("customerid"),
                column("firstname", PortableType::Text),
                column("lastname", PortableType::Text),
                column("email", PortableType::Text),
                column("phonenumber", PortableType::Text),
                column("address", PortableType::Text),
            ],
        ),
        table(
            "employees",
            vec![
                key("employeeid"),
                column("firstname", PortableType::Text),
                column("lastname", PortableType::Text),
                column("jobtitle", PortableType::Text),
                column("salary", PortableType::Decimal),
                reference("branchid", "branches", "branchid"),
            ],
        ),
    ])
}

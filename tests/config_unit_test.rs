//! Unit tests for YAML configuration loading.

use std::io::Write;
use tempfile::NamedTempFile;
use trimdump::config::DumpConfig;
use trimdump::dumper::FailureMode;
use trimdump::schema::{ColumnInfo, DatabaseBuilder, MemorySchemaSource};

const SHOP_YAML: &str = r#"
connection:
  host: db.internal
  port: 3307
  user: reader
  password: hunter2
binpath: /usr/local/bin/mysqldump
extra_args: ["--skip-triggers"]
timeout_secs: 120
max_concurrency: 4
failure_mode: continue
default_character_set: utf8mb4
max_allowed_packet: 64
databases:
  - name: shop
    destination: shop_anon
    tables:
      - name: customers
        where: "created_at > '2024-01-01'"
        limit: 100
        order: id DESC
        rules:
          - type: mask
            columns: [email]
            pattern: "[a-z]"
            surrogate: x
          - type: redact
            columns: [phone]
      - name: orders
        destination: orders_copy
        sample: 0.5
        filter:
          - customer_id: customers.id
          - status: "'vip'"
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

mod load_tests {
    use super::*;

    #[test]
    fn test_load_full_config() {
        let file = write_config(SHOP_YAML);
        let config = DumpConfig::load(file.path()).unwrap();

        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 3307);
        assert_eq!(config.connection.user, "reader");
        assert_eq!(config.connection.password.as_deref(), Some("hunter2"));
        assert_eq!(config.binpath, "/usr/local/bin/mysqldump");
        assert_eq!(config.extra_args, vec!["--skip-triggers".to_string()]);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_concurrency, Some(4));
        assert_eq!(config.failure_mode, FailureMode::Continue);
        assert_eq!(config.default_character_set.as_deref(), Some("utf8mb4"));
        assert_eq!(config.max_allowed_packet, Some(64));

        let db = &config.databases[0];
        assert_eq!(db.destination.as_deref(), Some("shop_anon"));
        let customers = &db.tables[0];
        assert_eq!(customers.filter_text.as_deref(), Some("created_at > '2024-01-01'"));
        assert_eq!(customers.limit, Some(100));
        assert_eq!(customers.rules.len(), 2);
        assert_eq!(customers.rules[0].rule_type, "mask");
        assert_eq!(customers.rules[0].surrogate.as_deref(), Some("x"));

        let orders = &db.tables[1];
        assert_eq!(orders.destination.as_deref(), Some("orders_copy"));
        assert_eq!(orders.sample, Some(0.5));
        assert_eq!(orders.filter.len(), 2);
        assert_eq!(
            orders.filter[1].0,
            vec![("status".to_string(), "'vip'".to_string())]
        );
    }

    #[test]
    fn test_missing_file() {
        let err = DumpConfig::load(std::path::Path::new("/nonexistent/trimdump.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_malformed_yaml() {
        let file = write_config("databases: [ { name: shop, tables: ");
        assert!(DumpConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_unknown_failure_mode() {
        assert!(DumpConfig::from_yaml("failure_mode: sometimes").is_err());
    }

    #[test]
    fn test_password_is_not_serialized() {
        let config = DumpConfig::from_yaml(SHOP_YAML).unwrap();
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert!(!yaml.contains("hunter2"));
        assert!(yaml.contains("db.internal"));
    }
}

mod resolve_tests {
    use super::*;

    #[tokio::test]
    async fn test_loaded_config_resolves_against_schema() {
        let config = DumpConfig::from_yaml(SHOP_YAML).unwrap();
        let source = MemorySchemaSource::new()
            .with_table(
                "shop",
                "customers",
                vec![
                    ColumnInfo::new("id", "int", 1).primary_key(),
                    ColumnInfo::new("email", "varchar", 2),
                    ColumnInfo::new("phone", "varchar", 3),
                    ColumnInfo::new("created_at", "datetime", 4),
                ],
            )
            .with_table(
                "shop",
                "orders",
                vec![
                    ColumnInfo::new("id", "int", 1).primary_key(),
                    ColumnInfo::new("customer_id", "int", 2),
                    ColumnInfo::new("status", "varchar", 3),
                ],
            );

        let db = DatabaseBuilder::new(&config.databases[0])
            .build(&source)
            .await
            .unwrap();

        assert_eq!(db.destination, "shop_anon");
        let customers = db.get_table_id("customers").unwrap();
        let orders = db.get_table_id("orders").unwrap();
        assert_eq!(db.graph.parents(orders), &[customers]);
        assert_eq!(db.table(orders).where_groups.len(), 2);
        assert_eq!(db.table(orders).destination.as_deref(), Some("orders_copy"));
        assert_eq!(db.table(customers).rules.len(), 2);
    }
}
